//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StoreError`: failures of a host collaborator (credential store, user
//!   directory, session store, error log)
//! - `CallbackError`: failures that abort a login callback instead of
//!   redirecting back to the login page

use std::fmt;

/// Errors from host collaborator storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database rejected or failed the operation.
    Database { details: String },
    /// A stored record could not be decoded.
    InvalidRecord { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::InvalidRecord { details } => write!(f, "invalid stored record: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors that abort a callback with a server error.
///
/// Recoverable failures (declined authorization, unknown email, provider
/// trouble) are not errors; they produce `CallbackOutcome::Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Provider credentials are missing or incomplete.
    Configuration { details: String },
    /// A host collaborator failed.
    Store { details: String },
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "login provider is not configured: {details}")
            }
            Self::Store { details } => write!(f, "login storage error: {details}"),
        }
    }
}

impl std::error::Error for CallbackError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let err = CallbackError::Configuration {
            details: "Lark client secret is empty".to_string(),
        };
        assert!(err.to_string().contains("not configured"));
        assert!(err.to_string().contains("client secret"));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Database {
            details: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "database error: connection refused");
    }
}
