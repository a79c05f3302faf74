//! The "login with Lark" OAuth callback.
//!
//! `LarkCallbackHandler::handle` runs the whole exchange for one request:
//!
//! 1. read the authorization code (absent when the user declined)
//! 2. resolve the Lark app credentials from the host
//! 3. get the app access token from the cache, fetching it on a miss
//! 4. exchange the code for a user access token
//! 5. fetch the user's email
//! 6. find the enabled local account with that email
//! 7. open a session, or record an error and send the user back to login
//!
//! Recoverable failures become `CallbackOutcome::Failure`. Only broken
//! configuration and host storage failures are returned as errors.

use lark_login_core::ErrorLogId;
use lark_login_provider::{
    APP_ACCESS_TOKEN_KEY, DEFAULT_APP_TOKEN_TTL, LarkApi, LarkError, TokenCache, UserProfile,
};
use oauth2::AuthorizationCode;
use rootcause::prelude::Report;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::account::UserDirectory;
use crate::credentials::{
    CredentialStore, LARK_PROVIDER_NAME, ProviderCredentials, resolve_provider_credentials,
};
use crate::error::CallbackError;
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::session::{Session, SessionEstablisher};

/// Title of every error record written by the callback.
pub const CALLBACK_ERROR_TITLE: &str = "Lark OAuth Callback Error";

/// `login_error_code` shown when Lark did not complete the authorization.
pub const AUTHORIZATION_FAILED_CODE: &str = "Lark authorization failed!";

/// Where the browser is sent after the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    /// Landing page after a successful login.
    pub landing_path: String,
    /// Login page that renders `login_error_code`.
    pub login_path: String,
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self {
            landing_path: "/helpdesk".to_string(),
            login_path: "/login".to_string(),
        }
    }
}

/// Query parameters of the callback request.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    /// Authorization code issued by Lark.
    pub code: Option<String>,
    /// Opaque state echoed back by Lark. Accepted but not validated.
    pub state: Option<String>,
}

/// Why a login attempt was sent back to the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// No authorization code, typically because the user declined.
    AuthorizationDeclined,
    /// Lark could not be reached or answered with something unusable.
    Upstream { details: String },
    /// No enabled local account has the email Lark reported.
    AccountNotFound { email: String },
}

impl LoginFailure {
    /// Message shown to the user through `login_error_code`.
    #[must_use]
    pub fn login_error_code(&self) -> String {
        match self {
            Self::AuthorizationDeclined | Self::Upstream { .. } => {
                AUTHORIZATION_FAILED_CODE.to_string()
            }
            Self::AccountNotFound { email } => format!("Email {email} not found"),
        }
    }

    /// Message written to the error log.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self {
            Self::AuthorizationDeclined => format!(
                "{CALLBACK_ERROR_TITLE}: Code not found (E.g. from declined Lark Authorization)"
            ),
            Self::Upstream { details } => format!("{CALLBACK_ERROR_TITLE}: {details}"),
            Self::AccountNotFound { email } => format!("Email {email} not found!"),
        }
    }
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationDeclined => write!(f, "authorization code missing"),
            Self::Upstream { details } => write!(f, "lark request failed: {details}"),
            Self::AccountNotFound { email } => write!(f, "no enabled account for {email}"),
        }
    }
}

/// Terminal result of one callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A session was opened.
    Success {
        session: Session,
        redirect: String,
    },
    /// The attempt failed and was recorded in the error log.
    Failure {
        error_id: ErrorLogId,
        reason: LoginFailure,
        redirect: String,
    },
}

impl CallbackOutcome {
    /// Returns the redirect target.
    #[must_use]
    pub fn redirect(&self) -> &str {
        match self {
            Self::Success { redirect, .. } | Self::Failure { redirect, .. } => redirect,
        }
    }

    /// Returns the opened session, if the login succeeded.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Success { session, .. } => Some(session),
            Self::Failure { .. } => None,
        }
    }

}

/// Builds `<login_path>?login_error_code=..&error_id=..`.
#[must_use]
pub fn failure_redirect(login_path: &str, login_error_code: &str, error_id: ErrorLogId) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("login_error_code", login_error_code)
        .append_pair("error_id", &error_id.to_string())
        .finish();
    format!("{login_path}?{query}")
}

/// Host capabilities the callback relies on.
#[derive(Clone)]
pub struct HostServices {
    pub credentials: Arc<dyn CredentialStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: Arc<dyn SessionEstablisher>,
    pub error_log: Arc<dyn ErrorLog>,
}

/// Handles the Lark OAuth callback.
#[derive(Clone)]
pub struct LarkCallbackHandler {
    lark: Arc<dyn LarkApi>,
    token_cache: Arc<TokenCache>,
    app_token_ttl: Duration,
    host: HostServices,
    redirects: RedirectTargets,
}

impl LarkCallbackHandler {
    /// Creates a handler with the default token TTL and redirect targets.
    #[must_use]
    pub fn new(lark: Arc<dyn LarkApi>, token_cache: Arc<TokenCache>, host: HostServices) -> Self {
        Self {
            lark,
            token_cache,
            app_token_ttl: DEFAULT_APP_TOKEN_TTL,
            host,
            redirects: RedirectTargets::default(),
        }
    }

    /// Sets how long a fetched app access token is reused.
    #[must_use]
    pub fn with_app_token_ttl(mut self, ttl: Duration) -> Self {
        self.app_token_ttl = ttl;
        self
    }

    /// Sets the redirect targets.
    #[must_use]
    pub fn with_redirects(mut self, redirects: RedirectTargets) -> Self {
        self.redirects = redirects;
        self
    }

    /// Returns the redirect targets.
    #[must_use]
    pub fn redirects(&self) -> &RedirectTargets {
        &self.redirects
    }

    /// Returns the host services.
    #[must_use]
    pub fn host(&self) -> &HostServices {
        &self.host
    }

    /// Runs the callback for one request.
    ///
    /// # Errors
    ///
    /// Returns `CallbackError::Configuration` when the Lark credentials are
    /// missing and `CallbackError::Store` when a host collaborator fails.
    /// Every other failure is reported as `CallbackOutcome::Failure`.
    #[instrument(skip_all, fields(state = request.state.as_deref().unwrap_or_default()))]
    pub async fn handle(
        &self,
        request: CallbackRequest,
    ) -> Result<CallbackOutcome, Report<CallbackError>> {
        let Some(code) = request.code.filter(|c| !c.is_empty()) else {
            return Ok(self.fail(LoginFailure::AuthorizationDeclined).await);
        };
        let code = AuthorizationCode::new(code);

        let credentials =
            resolve_provider_credentials(self.host.credentials.as_ref(), LARK_PROVIDER_NAME)
                .await?;

        let profile = match self.fetch_profile(&credentials, &code).await {
            Ok(profile) => profile,
            Err(report) => {
                return Ok(self
                    .fail(LoginFailure::Upstream {
                        details: report.current_context().to_string(),
                    })
                    .await);
            }
        };

        let account = self
            .host
            .directory
            .find_enabled_by_email(&profile.email)
            .await
            .map_err(|e| CallbackError::Store {
                details: e.current_context().to_string(),
            })?;

        let Some(account) = account else {
            return Ok(self
                .fail(LoginFailure::AccountNotFound {
                    email: profile.email,
                })
                .await);
        };

        let session = self
            .host
            .sessions
            .login(&account)
            .await
            .map_err(|e| CallbackError::Store {
                details: e.current_context().to_string(),
            })?;

        info!(account = account.name(), session_id = %session.id(), "lark login succeeded");

        Ok(CallbackOutcome::Success {
            session,
            redirect: self.redirects.landing_path.clone(),
        })
    }

    /// Steps 3 to 5: app token, user token, user profile.
    async fn fetch_profile(
        &self,
        credentials: &ProviderCredentials,
        code: &AuthorizationCode,
    ) -> Result<UserProfile, Report<LarkError>> {
        let app_token = self
            .token_cache
            .get_or_fetch(APP_ACCESS_TOKEN_KEY, self.app_token_ttl, || {
                self.lark
                    .fetch_app_access_token(credentials.app_id(), credentials.app_secret())
            })
            .await?;

        let user_token = self.lark.exchange_code(&app_token, code).await?;
        self.lark.fetch_user_profile(&user_token).await
    }

    /// Records the failure and builds the login redirect.
    async fn fail(&self, reason: LoginFailure) -> CallbackOutcome {
        let record = ErrorRecord::new(CALLBACK_ERROR_TITLE, reason.log_message());
        let error_id = record.id();

        warn!(error_id = %error_id, reason = %reason, "lark login failed");

        if let Err(e) = self.host.error_log.record(&record).await {
            warn!(error_id = %error_id, error = %e, "failed to persist error log record");
        }

        let redirect = failure_redirect(
            &self.redirects.login_path,
            &reason.login_error_code(),
            error_id,
        );

        CallbackOutcome::Failure {
            error_id,
            reason,
            redirect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::LocalAccount;
    use crate::credentials::SocialLoginKey;
    use crate::memory::{
        InMemoryCredentialStore, InMemoryErrorLog, InMemorySessions, InMemoryUserDirectory,
    };
    use async_trait::async_trait;
    use lark_login_provider::AppAccessToken;
    use oauth2::{AccessToken, ClientId, ClientSecret};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Simulated Lark that accepts any code and reports a fixed email.
    struct FakeLark {
        email: String,
        app_token_calls: AtomicUsize,
        fail_app_token: bool,
        fail_exchange: bool,
    }

    impl FakeLark {
        fn reporting(email: &str) -> Self {
            Self {
                email: email.to_string(),
                app_token_calls: AtomicUsize::new(0),
                fail_app_token: false,
                fail_exchange: false,
            }
        }

        fn app_token_calls(&self) -> usize {
            self.app_token_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LarkApi for FakeLark {
        async fn fetch_app_access_token(
            &self,
            app_id: &ClientId,
            app_secret: &ClientSecret,
        ) -> Result<AppAccessToken, Report<LarkError>> {
            self.app_token_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_app_token {
                return Err(LarkError::MissingField {
                    endpoint: "app_access_token",
                    field: "app_access_token",
                }
                .into());
            }
            assert_eq!(app_id.as_str(), "cli_123");
            assert_eq!(app_secret.secret(), "s3cret");
            Ok(AppAccessToken::new("appTok1".to_string()))
        }

        async fn exchange_code(
            &self,
            app_token: &AppAccessToken,
            code: &AuthorizationCode,
        ) -> Result<AccessToken, Report<LarkError>> {
            if self.fail_exchange {
                return Err(LarkError::MissingField {
                    endpoint: "oidc_access_token",
                    field: "data",
                }
                .into());
            }
            assert_eq!(code.secret(), "abc123");
            if app_token.secret() != "appTok1" && app_token.secret() != "cachedTok" {
                return Err(LarkError::Api {
                    endpoint: "oidc_access_token",
                    code: 99991663,
                    msg: "invalid app access token".to_string(),
                }
                .into());
            }
            Ok(AccessToken::new("usrTok1".to_string()))
        }

        async fn fetch_user_profile(
            &self,
            user_token: &AccessToken,
        ) -> Result<UserProfile, Report<LarkError>> {
            assert_eq!(user_token.secret(), "usrTok1");
            Ok(UserProfile {
                email: self.email.clone(),
                name: None,
                open_id: None,
            })
        }
    }

    struct Fixture {
        lark: Arc<FakeLark>,
        cache: Arc<TokenCache>,
        credentials: InMemoryCredentialStore,
        directory: InMemoryUserDirectory,
        sessions: InMemorySessions,
        error_log: InMemoryErrorLog,
    }

    impl Fixture {
        fn new(lark: FakeLark) -> Self {
            let credentials = InMemoryCredentialStore::new();
            credentials.insert(SocialLoginKey::new(LARK_PROVIDER_NAME, "cli_123", "s3cret"));

            let directory = InMemoryUserDirectory::new();
            directory.insert(LocalAccount::new("alice@example.com", "alice@example.com"));

            Self {
                lark: Arc::new(lark),
                cache: Arc::new(TokenCache::new()),
                credentials,
                sessions: InMemorySessions::new(chrono::Duration::hours(8))
                    .with_directory(directory.clone()),
                directory,
                error_log: InMemoryErrorLog::new(),
            }
        }

        fn handler(&self) -> LarkCallbackHandler {
            LarkCallbackHandler::new(
                self.lark.clone(),
                self.cache.clone(),
                HostServices {
                    credentials: Arc::new(self.credentials.clone()),
                    directory: Arc::new(self.directory.clone()),
                    sessions: Arc::new(self.sessions.clone()),
                    error_log: Arc::new(self.error_log.clone()),
                },
            )
        }
    }

    fn request(code: &str) -> CallbackRequest {
        CallbackRequest {
            code: Some(code.to_string()),
            state: Some("st".to_string()),
        }
    }

    #[tokio::test]
    async fn matching_account_logs_in() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        assert_eq!(outcome.redirect(), "/helpdesk");
        let session = outcome.session().expect("session");
        assert_eq!(session.account(), "alice@example.com");
        assert_eq!(fixture.sessions.get(session.id()), Some(session.clone()));
        assert!(fixture.error_log.records().is_empty());
    }

    #[tokio::test]
    async fn login_records_last_login() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));
        let before = chrono::Utc::now();

        fixture.handler().handle(request("abc123")).await.unwrap();

        let account = fixture
            .directory
            .get("alice@example.com")
            .expect("account");
        let last_login = account.last_login().expect("last login recorded");
        assert!(last_login >= before);
    }

    #[tokio::test]
    async fn email_match_ignores_case() {
        let fixture = Fixture::new(FakeLark::reporting("Alice@Example.com"));

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        assert_eq!(outcome.redirect(), "/helpdesk");
        let session = outcome.session().expect("session");
        assert_eq!(session.account(), "alice@example.com");
        assert!(fixture.error_log.records().is_empty());
    }

    #[tokio::test]
    async fn missing_code_redirects_to_login() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));

        let outcome = fixture
            .handler()
            .handle(CallbackRequest::default())
            .await
            .unwrap();

        let CallbackOutcome::Failure {
            error_id,
            reason,
            redirect,
        } = outcome
        else {
            panic!("expected failure");
        };
        assert_eq!(reason, LoginFailure::AuthorizationDeclined);
        assert_eq!(
            redirect,
            format!("/login?login_error_code=Lark+authorization+failed%21&error_id={error_id}")
        );
        assert!(fixture.sessions.is_empty());
        assert_eq!(fixture.lark.app_token_calls(), 0);

        let records = fixture.error_log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), error_id);
        assert_eq!(records[0].title(), CALLBACK_ERROR_TITLE);
        assert!(records[0].message().contains("Code not found"));
    }

    #[tokio::test]
    async fn empty_code_is_treated_as_missing() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));

        let outcome = fixture.handler().handle(request("")).await.unwrap();

        assert!(outcome.session().is_none());
        assert!(outcome.redirect().starts_with("/login?login_error_code="));
    }

    #[tokio::test]
    async fn unknown_email_redirects_with_email_code() {
        let fixture = Fixture::new(FakeLark::reporting("ghost@example.com"));

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        let CallbackOutcome::Failure {
            error_id, redirect, ..
        } = outcome
        else {
            panic!("expected failure");
        };
        assert_eq!(
            redirect,
            format!(
                "/login?login_error_code=Email+ghost%40example.com+not+found&error_id={error_id}"
            )
        );
        assert!(fixture.sessions.is_empty());

        let records = fixture.error_log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message(), "Email ghost@example.com not found!");
    }

    #[tokio::test]
    async fn disabled_account_cannot_log_in() {
        let fixture = Fixture::new(FakeLark::reporting("bob@example.com"));
        fixture
            .directory
            .insert(LocalAccount::new("bob@example.com", "bob@example.com").disabled());

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        assert!(matches!(
            outcome,
            CallbackOutcome::Failure {
                reason: LoginFailure::AccountNotFound { .. },
                ..
            }
        ));
        assert!(fixture.sessions.is_empty());
    }

    #[tokio::test]
    async fn cached_app_token_skips_provider() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));
        fixture.cache.set(
            APP_ACCESS_TOKEN_KEY,
            AppAccessToken::new("cachedTok".to_string()),
            Duration::from_secs(60),
        );

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        assert!(outcome.session().is_some());
        assert_eq!(fixture.lark.app_token_calls(), 0);
    }

    #[tokio::test]
    async fn fetched_app_token_is_cached() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));

        fixture.handler().handle(request("abc123")).await.unwrap();

        assert_eq!(fixture.lark.app_token_calls(), 1);
        assert_eq!(
            fixture.cache.get(APP_ACCESS_TOKEN_KEY),
            Some(AppAccessToken::new("appTok1".to_string()))
        );
    }

    #[tokio::test]
    async fn repeated_callbacks_give_same_outcome() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));
        let handler = fixture.handler();

        let first = handler.handle(request("abc123")).await.unwrap();
        let second = handler.handle(request("abc123")).await.unwrap();

        assert_eq!(first.redirect(), second.redirect());
        assert_eq!(
            first.session().map(Session::account),
            second.session().map(Session::account)
        );
        assert_eq!(fixture.lark.app_token_calls(), 1);
        assert_eq!(fixture.sessions.len(), 2);
    }

    #[tokio::test]
    async fn malformed_provider_response_fails_closed() {
        let mut lark = FakeLark::reporting("alice@example.com");
        lark.fail_exchange = true;
        let fixture = Fixture::new(lark);

        let outcome = fixture.handler().handle(request("abc123")).await.unwrap();

        let CallbackOutcome::Failure {
            reason, redirect, ..
        } = outcome
        else {
            panic!("expected failure");
        };
        assert!(matches!(reason, LoginFailure::Upstream { .. }));
        assert!(redirect.starts_with("/login?login_error_code=Lark+authorization+failed%21"));
        assert!(fixture.sessions.is_empty());

        let records = fixture.error_log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].message(),
            "Lark OAuth Callback Error: oidc_access_token response is missing `data`"
        );
    }

    #[tokio::test]
    async fn malformed_app_token_response_is_not_cached() {
        let mut lark = FakeLark::reporting("alice@example.com");
        lark.fail_app_token = true;
        let fixture = Fixture::new(lark);
        let handler = fixture.handler();

        let first = handler.handle(request("abc123")).await.unwrap();
        let second = handler.handle(request("abc123")).await.unwrap();

        assert!(first.session().is_none());
        assert!(second.session().is_none());
        assert!(fixture.cache.get(APP_ACCESS_TOKEN_KEY).is_none());
        assert_eq!(fixture.lark.app_token_calls(), 2);
        assert_eq!(fixture.error_log.records().len(), 2);
    }

    #[tokio::test]
    async fn missing_credentials_abort_the_request() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));
        let handler = LarkCallbackHandler::new(
            fixture.lark.clone(),
            fixture.cache.clone(),
            HostServices {
                credentials: Arc::new(InMemoryCredentialStore::new()),
                directory: Arc::new(fixture.directory.clone()),
                sessions: Arc::new(fixture.sessions.clone()),
                error_log: Arc::new(fixture.error_log.clone()),
            },
        );

        let err = handler.handle(request("abc123")).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            CallbackError::Configuration { .. }
        ));
        assert!(fixture.error_log.records().is_empty());
        assert_eq!(fixture.lark.app_token_calls(), 0);
    }

    #[tokio::test]
    async fn custom_redirect_targets() {
        let fixture = Fixture::new(FakeLark::reporting("alice@example.com"));
        let handler = fixture.handler().with_redirects(RedirectTargets {
            landing_path: "/app".to_string(),
            login_path: "/signin".to_string(),
        });

        let ok = handler.handle(request("abc123")).await.unwrap();
        assert_eq!(ok.redirect(), "/app");

        let failed = handler.handle(CallbackRequest::default()).await.unwrap();
        assert!(failed.redirect().starts_with("/signin?"));
    }

    #[test]
    fn failure_redirect_encodes_parameters() {
        let id = ErrorLogId::new();
        let redirect = failure_redirect("/login", "Email a+b@example.com not found", id);
        assert_eq!(
            redirect,
            format!("/login?login_error_code=Email+a%2Bb%40example.com+not+found&error_id={id}")
        );
    }
}
