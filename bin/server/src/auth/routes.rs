//! Authentication routes for Lark login, callback, and logout.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lark_login_core::SessionId;
use lark_login_platform_access::{
    CallbackError, CallbackOutcome, CallbackRequest, LARK_PROVIDER_NAME,
    resolve_provider_credentials,
};
use lark_login_provider::LarkError;
use oauth2::CsrfToken;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{error, warn};

use super::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sid";

/// Query parameters for the Lark callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Starts the Lark login flow by redirecting to the authorize page.
pub async fn lark_login(State(state): State<Arc<AppState>>) -> Result<Redirect, AuthError> {
    let credentials = resolve_provider_credentials(
        state.callback.host().credentials.as_ref(),
        LARK_PROVIDER_NAME,
    )
    .await?;

    let auth_url = state.lark_client.authorize_url(
        credentials.app_id(),
        &state.lark_config.redirect_uri,
        &CsrfToken::new_random(),
    )?;

    Ok(Redirect::to(&auth_url))
}

/// Handles the Lark callback after the user authorizes (or declines) the app.
pub async fn lark_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let outcome = state
        .callback
        .handle(CallbackRequest {
            code: query.code,
            state: query.state,
        })
        .await?;

    match outcome {
        CallbackOutcome::Success { session, redirect } => {
            let session_cookie = Cookie::build((SESSION_COOKIE, session.id().to_string()))
                .path("/")
                .http_only(true)
                .secure(state.session_config.secure_cookies)
                .same_site(SameSite::Lax)
                .max_age(TimeDuration::minutes(state.session_config.duration_minutes));

            Ok((jar.add(session_cookie), Redirect::to(&redirect)).into_response())
        }
        CallbackOutcome::Failure { redirect, .. } => Ok(Redirect::to(&redirect).into_response()),
    }
}

/// Logs out the user by deleting their session.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        match SessionId::from_str(session_cookie.value()) {
            Ok(session_id) => {
                if let Err(e) = state.callback.host().sessions.logout(session_id).await {
                    warn!(error = %e, "failed to delete session on logout");
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed session cookie"),
        }
    }

    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (
        jar.add(remove_session),
        Redirect::to(&state.callback.redirects().login_path),
    )
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    Configuration(String),
    Store(String),
}

impl From<Report<CallbackError>> for AuthError {
    fn from(report: Report<CallbackError>) -> Self {
        let context = report.current_context();
        match context {
            CallbackError::Configuration { .. } => Self::Configuration(context.to_string()),
            CallbackError::Store { .. } => Self::Store(context.to_string()),
        }
    }
}

impl From<Report<LarkError>> for AuthError {
    fn from(report: Report<LarkError>) -> Self {
        Self::Configuration(report.current_context().to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Configuration(msg) => {
                error!("Lark login is misconfigured: {}", msg);
            }
            Self::Store(msg) => {
                error!("Login storage error: {}", msg);
            }
        }

        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
