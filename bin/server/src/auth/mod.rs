//! Authentication module for the help-desk server.
//!
//! This module provides:
//! - The "login with Lark" routes (start, callback, logout)
//! - Postgres implementations of the login collaborators
//!
//! Accounts are never created here. A Lark identity can only log in if the
//! help desk already has an enabled account with the same email.

pub mod db;
pub mod routes;

use axum::{Router, routing::get};
use lark_login_platform_access::LarkCallbackHandler;
use lark_login_provider::LarkClient;
use std::sync::Arc;

use crate::config::{LarkConfig, SessionConfig};

pub use routes::{lark_callback, lark_login, logout};

/// Shared application state.
pub struct AppState {
    /// Callback handler wired to the host collaborators.
    pub callback: LarkCallbackHandler,
    /// Lark client used to build the authorize URL.
    pub lark_client: LarkClient,
    /// Lark configuration.
    pub lark_config: LarkConfig,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        callback: LarkCallbackHandler,
        lark_client: LarkClient,
        lark_config: LarkConfig,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            callback,
            lark_client,
            lark_config,
            session_config,
        }
    }
}

/// Builds the router for the authentication routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/lark/login", get(lark_login))
        .route("/auth/lark/callback", get(lark_callback))
        .route("/auth/logout", get(logout))
        .with_state(state)
}
