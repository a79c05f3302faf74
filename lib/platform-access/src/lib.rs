//! "Login with Lark" callback handling for the helpdesk.
//!
//! This crate provides:
//! - `LarkCallbackHandler`: turns a Lark authorization code into a local
//!   session or a recorded, user-visible failure
//! - Host collaborator traits (`CredentialStore`, `UserDirectory`,
//!   `SessionEstablisher`, `ErrorLog`) and in-memory implementations
//! - `LocalAccount`, `Session` and `ErrorRecord`
//!
//! # Example
//!
//! ```
//! use lark_login_platform_access::{LoginFailure, failure_redirect};
//! use lark_login_core::ErrorLogId;
//!
//! let failure = LoginFailure::AccountNotFound {
//!     email: "ghost@example.com".to_string(),
//! };
//! let id = ErrorLogId::new();
//! let redirect = failure_redirect("/login", &failure.login_error_code(), id);
//!
//! assert!(redirect.starts_with("/login?login_error_code=Email+ghost%40example.com+not+found"));
//! ```

pub mod account;
pub mod callback;
pub mod credentials;
pub mod error;
pub mod error_log;
pub mod memory;
pub mod session;

pub use account::{LocalAccount, UserDirectory};
pub use callback::{
    AUTHORIZATION_FAILED_CODE, CALLBACK_ERROR_TITLE, CallbackOutcome, CallbackRequest,
    HostServices, LarkCallbackHandler, LoginFailure, RedirectTargets, failure_redirect,
};
pub use credentials::{
    CredentialStore, LARK_PROVIDER_NAME, ProviderCredentials, SocialLoginKey,
    resolve_provider_credentials,
};
pub use error::{CallbackError, StoreError};
pub use error_log::{ErrorLog, ErrorRecord};
pub use memory::{InMemoryCredentialStore, InMemoryErrorLog, InMemorySessions, InMemoryUserDirectory};
pub use session::{Session, SessionEstablisher};
