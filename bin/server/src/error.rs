//! Domain error types for server operations.
//!
//! `StartupError` covers everything that can stop the process before it
//! serves requests. Request-time errors come from
//! `lark_login_platform_access::CallbackError` and are rendered by
//! `auth::routes`.

use std::fmt;

/// Errors raised while starting the server.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Configuration { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// The Lark client could not be built.
    LarkClient { details: String },
    /// The listener could not be bound or the server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "failed to load configuration: {details}")
            }
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::LarkClient { details } => {
                write!(f, "failed to create Lark client: {details}")
            }
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}
