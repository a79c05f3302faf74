//! In-memory host collaborators.
//!
//! Backs the handler and route tests. State is shared between clones.

use async_trait::async_trait;
use chrono::Duration;
use lark_login_core::SessionId;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::account::{LocalAccount, UserDirectory};
use crate::credentials::{CredentialStore, SocialLoginKey};
use crate::error::StoreError;
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::session::{Session, SessionEstablisher};

/// Social login keys held in memory, keyed by provider name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    keys: Arc<RwLock<HashMap<String, SocialLoginKey>>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the key for its provider.
    pub fn insert(&self, key: SocialLoginKey) {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.provider_name.clone(), key);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_social_login_key(
        &self,
        provider_name: &str,
    ) -> Result<Option<SocialLoginKey>, Report<StoreError>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.get(provider_name).cloned())
    }
}

/// Accounts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    accounts: Arc<RwLock<Vec<LocalAccount>>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    pub fn insert(&self, account: LocalAccount) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.push(account);
    }

    /// Returns the account with the given canonical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<LocalAccount> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.iter().find(|a| a.name() == name).cloned()
    }

    /// Stamps the last login time of the named account.
    pub fn record_login(&self, name: &str) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = accounts.iter_mut().find(|a| a.name() == name) {
            account.record_login();
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_enabled_by_email(
        &self,
        email: &str,
    ) -> Result<Option<LocalAccount>, Report<StoreError>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts
            .iter()
            .find(|a| a.is_enabled() && a.email().eq_ignore_ascii_case(email))
            .cloned())
    }
}

/// Sessions held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySessions {
    duration: Duration,
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    directory: Option<InMemoryUserDirectory>,
}

impl InMemorySessions {
    /// Creates an empty store whose sessions last `duration`.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            directory: None,
        }
    }

    /// Records last login times in `directory` on every login.
    #[must_use]
    pub fn with_directory(mut self, directory: InMemoryUserDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Returns the session with the given id, unless it has expired.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&id).filter(|s| !s.is_expired()).cloned()
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.len()
    }

    /// Returns true if no session is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionEstablisher for InMemorySessions {
    async fn login(&self, account: &LocalAccount) -> Result<Session, Report<StoreError>> {
        let session = Session::new(account.name(), self.duration);
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.insert(session.id(), session.clone());
        }
        if let Some(directory) = &self.directory {
            directory.record_login(account.name());
        }
        Ok(session)
    }

    async fn logout(&self, id: SessionId) -> Result<(), Report<StoreError>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&id);
        Ok(())
    }
}

/// Error records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryErrorLog {
    records: Arc<RwLock<Vec<ErrorRecord>>>,
}

impl InMemoryErrorLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<ErrorRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.clone()
    }
}

#[async_trait]
impl ErrorLog for InMemoryErrorLog {
    async fn record(&self, record: &ErrorRecord) -> Result<(), Report<StoreError>> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push(record.clone());
        Ok(())
    }
}
