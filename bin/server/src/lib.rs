//! Help-desk login server.
//!
//! Serves the "login with Lark" routes on top of Postgres-backed accounts,
//! sessions and error logs.

pub mod auth;
pub mod config;
pub mod error;
