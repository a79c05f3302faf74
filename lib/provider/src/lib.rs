//! Lark Open API client for the "login with Lark" flow.
//!
//! This crate provides:
//! - `LarkClient`: the three calls of the login exchange (app token, user
//!   token, user info) plus the authorize URL used to start the flow
//! - `LarkApi`: the trait the callback handler depends on
//! - `TokenCache`: a process-wide, single-flight TTL cache for the app
//!   access token
//!
//! Every response is parsed into a typed envelope; a missing `data` object
//! or field is reported as `LarkError::MissingField` rather than assumed.

pub mod cache;
pub mod client;
pub mod error;
pub mod models;

pub use cache::{APP_ACCESS_TOKEN_KEY, DEFAULT_APP_TOKEN_TTL, TokenCache};
pub use client::{LARK_BASE_URL, LarkApi, LarkClient};
pub use error::LarkError;
pub use models::{AppAccessToken, UserProfile};
