//! Core types and utilities for lark-login.
//!
//! This crate provides the `Result` alias and the strongly-typed identifiers
//! shared by the provider client, the callback handler and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ErrorLogId, ParseIdError, SessionId};
