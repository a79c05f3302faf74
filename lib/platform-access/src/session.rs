//! Session management for logged-in accounts.
//!
//! A session is opened after a successful Lark login and identifies the
//! local account on subsequent requests through the session cookie.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lark_login_core::SessionId;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

use crate::account::LocalAccount;
use crate::error::StoreError;

/// An active session for a local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    id: SessionId,
    /// Canonical name of the logged-in account.
    account: String,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session for the given account, valid for `duration`.
    #[must_use]
    pub fn new(account: impl Into<String>, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            account: account.into(),
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Creates a session with all fields specified.
    ///
    /// Use this when reconstituting a session from storage.
    #[must_use]
    pub fn with_all_fields(
        id: SessionId,
        account: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            created_at,
            expires_at,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the canonical name of the logged-in account.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// The host's login manager.
#[async_trait]
pub trait SessionEstablisher: Send + Sync {
    /// Opens a session for `account` and runs the host's post-login
    /// bookkeeping (last login time).
    async fn login(&self, account: &LocalAccount) -> Result<Session, Report<StoreError>>;

    /// Ends the session, if it exists.
    async fn logout(&self, id: SessionId) -> Result<(), Report<StoreError>>;
}
