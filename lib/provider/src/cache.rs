//! Process-wide cache for the Lark app access token.
//!
//! Concurrent misses are single-flight: the first caller fetches while the
//! others wait on the fetch lock and then read the freshly cached token.
//! Failed fetches are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::models::AppAccessToken;

/// Cache key under which the app access token is stored.
pub const APP_ACCESS_TOKEN_KEY: &str = "app_access_token";

/// How long a fetched app access token is reused.
pub const DEFAULT_APP_TOKEN_TTL: Duration = Duration::from_secs(6000);

#[derive(Debug)]
struct CacheEntry {
    token: AppAccessToken,
    expires_at: Instant,
}

/// Key-value token store with per-entry expiry.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    fetch_lock: Mutex<()>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token stored under `key` if it has not expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<AppAccessToken> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.token.clone())
    }

    /// Stores `token` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: &str, token: AppAccessToken, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            CacheEntry {
                token,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns the cached token, or runs `fetch` and caches its result.
    ///
    /// # Errors
    ///
    /// Returns the error from `fetch`; nothing is cached in that case.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<AppAccessToken, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AppAccessToken, E>>,
    {
        if let Some(token) = self.get(key) {
            debug!(key, "token cache hit");
            return Ok(token);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(token) = self.get(key) {
            debug!(key, "token cache filled by concurrent fetch");
            return Ok(token);
        }

        debug!(key, "token cache miss");
        let token = fetch().await?;
        self.set(key, token.clone(), ttl);
        Ok(token)
    }
}
