//! Local account records owned by the host application.
//!
//! The login flow only reads accounts: it looks one up by the email Lark
//! reports and starts a session for its canonical name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A user account of the host application.
///
/// `name` is the canonical identifier sessions are opened for. The host
/// derives it from the email address, but it need not be identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    /// Canonical account identifier.
    name: String,
    /// Email address used to match Lark identities.
    email: String,
    /// Disabled accounts can never log in.
    enabled: bool,
    /// When the account last completed a login.
    last_login: Option<DateTime<Utc>>,
}

impl LocalAccount {
    /// Creates an enabled account that has never logged in.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            enabled: true,
            last_login: None,
        }
    }

    /// Creates an account with all fields specified.
    ///
    /// Use this when reconstituting an account from storage.
    #[must_use]
    pub fn with_all_fields(
        name: String,
        email: String,
        enabled: bool,
        last_login: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name,
            email,
            enabled,
            last_login,
        }
    }

    /// Returns the same account marked as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the canonical account identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the account's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns true if the account may log in.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns when the account last logged in, if ever.
    #[must_use]
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    /// Records a completed login.
    pub fn record_login(&mut self) {
        self.last_login = Some(Utc::now());
    }
}

/// Read access to the host's user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds the enabled account with the given email, if any.
    ///
    /// At most one account is returned even if several match.
    async fn find_enabled_by_email(
        &self,
        email: &str,
    ) -> Result<Option<LocalAccount>, Report<StoreError>>;
}
