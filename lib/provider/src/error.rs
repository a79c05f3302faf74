//! Error types for calls to the Lark Open API.

use std::fmt;

/// Errors from the Lark Open API.
///
/// Every variant other than `Configuration` means the provider could not be
/// reached or answered with something unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LarkError {
    /// The client could not be built or a URL could not be formed.
    Configuration { details: String },
    /// The request failed before a response arrived (connect, timeout).
    Request {
        endpoint: &'static str,
        details: String,
    },
    /// The provider answered with a non-success HTTP status.
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    /// The response body was not the expected JSON.
    Decode {
        endpoint: &'static str,
        details: String,
    },
    /// The provider reported an error code in the response envelope.
    Api {
        endpoint: &'static str,
        code: i64,
        msg: String,
    },
    /// A field the flow depends on was absent or empty.
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },
}

impl LarkError {
    /// Returns true if the provider was reached but its answer was unusable.
    #[must_use]
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::MissingField { .. })
    }
}

impl fmt::Display for LarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "lark client configuration error: {details}")
            }
            Self::Request { endpoint, details } => {
                write!(f, "request to {endpoint} failed: {details}")
            }
            Self::Status {
                endpoint,
                status,
                body,
            } => {
                write!(f, "{endpoint} returned HTTP {status}: {body}")
            }
            Self::Decode { endpoint, details } => {
                write!(f, "failed to decode {endpoint} response: {details}")
            }
            Self::Api {
                endpoint,
                code,
                msg,
            } => {
                write!(f, "{endpoint} returned error code {code}: {msg}")
            }
            Self::MissingField { endpoint, field } => {
                write!(f, "{endpoint} response is missing `{field}`")
            }
        }
    }
}

impl std::error::Error for LarkError {}
