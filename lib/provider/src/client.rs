//! HTTP client for the Lark Open API endpoints used during login.

use async_trait::async_trait;
use oauth2::{AccessToken, AuthorizationCode, ClientId, ClientSecret, CsrfToken};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::LarkError;
use crate::models::{
    AppAccessToken, AppAccessTokenRequest, AppAccessTokenResponse, Envelope, UserAccessTokenData,
    UserAccessTokenRequest, UserInfoData, UserProfile, required,
};

/// Public Lark Open API host.
pub const LARK_BASE_URL: &str = "https://open.larksuite.com";

const APP_ACCESS_TOKEN_PATH: &str = "/open-apis/auth/v3/app_access_token/internal";
const USER_ACCESS_TOKEN_PATH: &str = "/open-apis/authen/v1/oidc/access_token";
const USER_INFO_PATH: &str = "/open-apis/authen/v1/user_info";
const AUTHORIZE_PATH: &str = "/open-apis/authen/v1/authorize";

/// Operations of the login exchange.
///
/// `LarkClient` is the production implementation; the callback handler only
/// sees this trait.
#[async_trait]
pub trait LarkApi: Send + Sync {
    /// Exchanges app credentials for an app access token.
    async fn fetch_app_access_token(
        &self,
        app_id: &ClientId,
        app_secret: &ClientSecret,
    ) -> Result<AppAccessToken, Report<LarkError>>;

    /// Exchanges an authorization code for a user access token.
    async fn exchange_code(
        &self,
        app_token: &AppAccessToken,
        code: &AuthorizationCode,
    ) -> Result<AccessToken, Report<LarkError>>;

    /// Fetches the profile of the user the token belongs to.
    async fn fetch_user_profile(
        &self,
        user_token: &AccessToken,
    ) -> Result<UserProfile, Report<LarkError>>;
}

/// reqwest-backed Lark Open API client.
#[derive(Debug, Clone)]
pub struct LarkClient {
    http: reqwest::Client,
    base_url: String,
}

impl LarkClient {
    /// Creates a client whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, Report<LarkError>> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| LarkError::Configuration {
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: LARK_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (for self-hosted gateways and mock servers).
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the URL that starts the Lark authorization flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is not a valid URL.
    pub fn authorize_url(
        &self,
        app_id: &ClientId,
        redirect_uri: &str,
        state: &CsrfToken,
    ) -> Result<String, Report<LarkError>> {
        let url = url::Url::parse_with_params(
            &format!("{}{}", self.base_url, AUTHORIZE_PATH),
            &[
                ("app_id", app_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("state", state.secret().as_str()),
            ],
        )
        .map_err(|e| LarkError::Configuration {
            details: format!("invalid authorize URL: {e}"),
        })?;

        Ok(url.to_string())
    }

    /// Sends a request and decodes a successful JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Report<LarkError>> {
        let response = request.send().await.map_err(|e| LarkError::Request {
            endpoint,
            details: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LarkError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response.text().await.map_err(|e| LarkError::Request {
            endpoint,
            details: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| {
            LarkError::Decode {
                endpoint,
                details: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl LarkApi for LarkClient {
    #[instrument(skip(self, app_secret))]
    async fn fetch_app_access_token(
        &self,
        app_id: &ClientId,
        app_secret: &ClientSecret,
    ) -> Result<AppAccessToken, Report<LarkError>> {
        const ENDPOINT: &str = "app_access_token";

        let body = AppAccessTokenRequest {
            app_id: app_id.as_str(),
            app_secret: app_secret.secret().as_str(),
        };
        let request = self
            .http
            .post(format!("{}{}", self.base_url, APP_ACCESS_TOKEN_PATH))
            .json(&body);

        let response: AppAccessTokenResponse = self.send_json(ENDPOINT, request).await?;
        let token = response.into_token(ENDPOINT)?;

        debug!("fetched app access token");
        Ok(token)
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        app_token: &AppAccessToken,
        code: &AuthorizationCode,
    ) -> Result<AccessToken, Report<LarkError>> {
        const ENDPOINT: &str = "oidc_access_token";

        let body = UserAccessTokenRequest {
            grant_type: "authorization_code",
            code: code.secret().as_str(),
        };
        let request = self
            .http
            .post(format!("{}{}", self.base_url, USER_ACCESS_TOKEN_PATH))
            .bearer_auth(app_token.secret())
            .json(&body);

        let envelope: Envelope<UserAccessTokenData> = self.send_json(ENDPOINT, request).await?;
        let data = envelope.into_data(ENDPOINT)?;
        let access_token = required(data.access_token, ENDPOINT, "data.access_token")?;

        debug!("exchanged authorization code for user access token");
        Ok(AccessToken::new(access_token))
    }

    #[instrument(skip_all)]
    async fn fetch_user_profile(
        &self,
        user_token: &AccessToken,
    ) -> Result<UserProfile, Report<LarkError>> {
        const ENDPOINT: &str = "user_info";

        let request = self
            .http
            .get(format!("{}{}", self.base_url, USER_INFO_PATH))
            .bearer_auth(user_token.secret());

        let envelope: Envelope<UserInfoData> = self.send_json(ENDPOINT, request).await?;
        let data = envelope.into_data(ENDPOINT)?;
        let email = required(data.email, ENDPOINT, "data.email")?;

        debug!("fetched lark user profile");
        Ok(UserProfile {
            email,
            name: data.name,
            open_id: data.open_id,
        })
    }
}
