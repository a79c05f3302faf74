//! Identity-provider credentials stored by the host.
//!
//! The host keeps one social login key per provider. The login flow reads
//! the Lark key on every request; it is never cached here, so an operator
//! rotating the secret takes effect on the next login.

use async_trait::async_trait;
use oauth2::{ClientId, ClientSecret};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{CallbackError, StoreError};

/// Provider name of the Lark social login key.
pub const LARK_PROVIDER_NAME: &str = "Lark";

/// A stored social login key record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLoginKey {
    /// Provider the key belongs to (e.g. "Lark").
    pub provider_name: String,
    /// OAuth client id (the Lark app id).
    pub client_id: Option<String>,
    /// OAuth client secret (the Lark app secret), already decrypted.
    pub client_secret: Option<String>,
}

impl SocialLoginKey {
    /// Creates a complete key record.
    #[must_use]
    pub fn new(
        provider_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
        }
    }
}

impl std::fmt::Debug for SocialLoginKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialLoginKey")
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Lookup of social login keys in the host's secrets store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds the key configured for `provider_name`.
    async fn find_social_login_key(
        &self,
        provider_name: &str,
    ) -> Result<Option<SocialLoginKey>, Report<StoreError>>;
}

/// App-level identity used to call the provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    app_id: ClientId,
    app_secret: ClientSecret,
}

impl ProviderCredentials {
    /// Creates credentials from a raw id and secret.
    #[must_use]
    pub fn new(app_id: String, app_secret: String) -> Self {
        Self {
            app_id: ClientId::new(app_id),
            app_secret: ClientSecret::new(app_secret),
        }
    }

    /// Returns the app id.
    #[must_use]
    pub fn app_id(&self) -> &ClientId {
        &self.app_id
    }

    /// Returns the app secret.
    #[must_use]
    pub fn app_secret(&self) -> &ClientSecret {
        &self.app_secret
    }
}

/// Resolves the credentials configured for `provider_name`.
///
/// # Errors
///
/// Returns `CallbackError::Configuration` if no key exists or its id or
/// secret is missing or empty, and `CallbackError::Store` if the lookup
/// itself fails. Both abort the request.
pub async fn resolve_provider_credentials(
    store: &dyn CredentialStore,
    provider_name: &str,
) -> Result<ProviderCredentials, Report<CallbackError>> {
    let key = store
        .find_social_login_key(provider_name)
        .await
        .map_err(|e| CallbackError::Store {
            details: e.current_context().to_string(),
        })?;

    let Some(key) = key else {
        error!(provider = provider_name, "social login key not found");
        return Err(CallbackError::Configuration {
            details: format!("{provider_name} social login key not found"),
        }
        .into());
    };

    let app_id = key.client_id.filter(|id| !id.is_empty());
    let app_secret = key.client_secret.filter(|secret| !secret.is_empty());

    match (app_id, app_secret) {
        (Some(app_id), Some(app_secret)) => Ok(ProviderCredentials::new(app_id, app_secret)),
        _ => {
            error!(
                provider = provider_name,
                "social login key has no client id or client secret"
            );
            Err(CallbackError::Configuration {
                details: format!("{provider_name} client id or client secret not configured"),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCredentialStore;

    #[tokio::test]
    async fn resolves_complete_key() {
        let store = InMemoryCredentialStore::new();
        store.insert(SocialLoginKey::new(LARK_PROVIDER_NAME, "cli_123", "s3cret"));

        let creds = resolve_provider_credentials(&store, LARK_PROVIDER_NAME)
            .await
            .unwrap();
        assert_eq!(creds.app_id().as_str(), "cli_123");
        assert_eq!(creds.app_secret().secret(), "s3cret");
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let store = InMemoryCredentialStore::new();

        let err = resolve_provider_credentials(&store, LARK_PROVIDER_NAME)
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            CallbackError::Configuration { .. }
        ));
    }

    #[tokio::test]
    async fn empty_secret_is_configuration_error() {
        let store = InMemoryCredentialStore::new();
        store.insert(SocialLoginKey {
            provider_name: LARK_PROVIDER_NAME.to_string(),
            client_id: Some("cli_123".to_string()),
            client_secret: Some(String::new()),
        });

        let err = resolve_provider_credentials(&store, LARK_PROVIDER_NAME)
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            CallbackError::Configuration { .. }
        ));
    }

    #[tokio::test]
    async fn missing_client_id_is_configuration_error() {
        let store = InMemoryCredentialStore::new();
        store.insert(SocialLoginKey {
            provider_name: LARK_PROVIDER_NAME.to_string(),
            client_id: None,
            client_secret: Some("s3cret".to_string()),
        });

        let err = resolve_provider_credentials(&store, LARK_PROVIDER_NAME)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("client id or client secret"));
    }

    #[tokio::test]
    async fn key_for_other_provider_is_ignored() {
        let store = InMemoryCredentialStore::new();
        store.insert(SocialLoginKey::new("GitHub", "gh", "gh-secret"));

        assert!(
            resolve_provider_credentials(&store, LARK_PROVIDER_NAME)
                .await
                .is_err()
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let key = SocialLoginKey::new(LARK_PROVIDER_NAME, "cli_123", "s3cret");
        let debug = format!("{key:?}");
        assert!(debug.contains("cli_123"));
        assert!(!debug.contains("s3cret"));
    }
}
