//! Wire types for Lark Open API responses.
//!
//! Lark wraps most payloads in `{"code": 0, "msg": "...", "data": {...}}`.
//! The app token endpoint is the exception and puts the token at the top
//! level. Fields are optional on the wire and checked explicitly.

use oauth2::AccessToken;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LarkError;

/// Token authorizing the application itself to call Lark APIs.
#[derive(Clone)]
pub struct AppAccessToken(AccessToken);

impl AppAccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(AccessToken::new(token))
    }

    /// Returns the raw token for use as a bearer credential.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.0.secret()
    }
}

impl fmt::Debug for AppAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppAccessToken([redacted])")
    }
}

impl PartialEq for AppAccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.secret() == other.secret()
    }
}

impl Eq for AppAccessToken {}

/// Identity of the user who completed the Lark authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Email address reported by Lark.
    pub email: String,
    /// Display name, if Lark returned one.
    pub name: Option<String>,
    /// The user's open id within the app, if Lark returned one.
    pub open_id: Option<String>,
}

/// Request body for the internal app access token endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct AppAccessTokenRequest<'a> {
    pub app_id: &'a str,
    pub app_secret: &'a str,
}

/// Request body for the OIDC user access token endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct UserAccessTokenRequest<'a> {
    pub grant_type: &'static str,
    pub code: &'a str,
}

/// Response of the internal app access token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct AppAccessTokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    app_access_token: Option<String>,
}

impl AppAccessTokenResponse {
    pub(crate) fn into_token(self, endpoint: &'static str) -> Result<AppAccessToken, LarkError> {
        if self.code != 0 {
            return Err(LarkError::Api {
                endpoint,
                code: self.code,
                msg: self.msg,
            });
        }
        self.app_access_token
            .filter(|t| !t.is_empty())
            .map(AppAccessToken::new)
            .ok_or(LarkError::MissingField {
                endpoint,
                field: "app_access_token",
            })
    }
}

/// The `{code, msg, data}` envelope used by the authen endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Returns `data`, or the error the envelope describes.
    pub(crate) fn into_data(self, endpoint: &'static str) -> Result<T, LarkError> {
        if self.code != 0 {
            return Err(LarkError::Api {
                endpoint,
                code: self.code,
                msg: self.msg,
            });
        }
        self.data.ok_or(LarkError::MissingField {
            endpoint,
            field: "data",
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserAccessTokenData {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoData {
    pub email: Option<String>,
    pub name: Option<String>,
    pub open_id: Option<String>,
}

/// Treats an absent or empty string field as missing.
pub(crate) fn required(
    value: Option<String>,
    endpoint: &'static str,
    field: &'static str,
) -> Result<String, LarkError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(LarkError::MissingField { endpoint, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_token_debug_is_redacted() {
        let token = AppAccessToken::new("appTok1".to_string());
        assert!(!format!("{token:?}").contains("appTok1"));
        assert_eq!(token.secret(), "appTok1");
    }

    #[test]
    fn app_token_response_with_token() {
        let response: AppAccessTokenResponse = serde_json::from_str(
            r#"{"code":0,"msg":"ok","app_access_token":"appTok1","expire":7200}"#,
        )
        .expect("parse");
        let token = response.into_token("app_access_token").expect("token");
        assert_eq!(token.secret(), "appTok1");
    }

    #[test]
    fn app_token_response_error_code() {
        let response: AppAccessTokenResponse =
            serde_json::from_str(r#"{"code":10014,"msg":"app secret invalid"}"#).expect("parse");
        let err = response.into_token("app_access_token").unwrap_err();
        assert_eq!(
            err,
            LarkError::Api {
                endpoint: "app_access_token",
                code: 10014,
                msg: "app secret invalid".to_string(),
            }
        );
    }

    #[test]
    fn app_token_response_without_token_is_missing_field() {
        let response: AppAccessTokenResponse = serde_json::from_str("{}").expect("parse");
        let err = response.into_token("app_access_token").unwrap_err();
        assert!(matches!(
            err,
            LarkError::MissingField {
                field: "app_access_token",
                ..
            }
        ));
    }

    #[test]
    fn envelope_without_data_is_missing_field() {
        let envelope: Envelope<UserAccessTokenData> =
            serde_json::from_str(r#"{"code":0,"msg":"success"}"#).expect("parse");
        let err = envelope.into_data("oidc_access_token").unwrap_err();
        assert!(matches!(err, LarkError::MissingField { field: "data", .. }));
    }

    #[test]
    fn envelope_ignores_unknown_fields() {
        let envelope: Envelope<UserInfoData> = serde_json::from_str(
            r#"{"code":0,"data":{"email":"alice@example.com","tenant_key":"t1","avatar_url":"x"}}"#,
        )
        .expect("parse");
        let data = envelope.into_data("user_info").expect("data");
        assert_eq!(data.email.as_deref(), Some("alice@example.com"));
        assert!(data.name.is_none());
    }

    #[test]
    fn required_rejects_empty_string() {
        let err = required(Some(String::new()), "user_info", "data.email").unwrap_err();
        assert!(matches!(
            err,
            LarkError::MissingField {
                field: "data.email",
                ..
            }
        ));
    }
}
