//! Session API endpoints.
//!
//! - POST `/login` - Issue an access/refresh token pair
//! - POST `/refresh-token` - Exchange the refresh cookie for a new access token
//! - POST `/logout` - Clear the refresh cookie
//!
//! The server keeps no session state: the refresh token is self-verifying and
//! lives only in the client's HttpOnly cookie.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct SessionState {
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    /// Subject every login is issued for. Authenticating real principals is
    /// outside this service.
    pub login_subject: Arc<str>,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
}

/// Start a session: access token in the body, refresh token in an HttpOnly cookie.
async fn login(State(state): State<SessionState>) -> Result<impl IntoResponse, ApiError> {
    let subject = state.login_subject.as_ref();

    let access = state
        .jwt
        .issue_access_token(subject)
        .token_err("Failed to issue access token")?;
    let refresh = state
        .jwt
        .issue_refresh_token(subject)
        .token_err("Failed to issue refresh token")?;

    info!(subject = %subject, expires_at = refresh.expires_at, "Session started");

    let cookie = refresh_cookie(&refresh.token, refresh.duration, state.secure_cookies);

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token: access.token,
        }),
    ))
}

/// Mint a new access token from the refresh cookie.
///
/// The token is read from the cookie only; nothing in the request body is
/// consulted. The refresh token is not rotated, so a stolen refresh cookie
/// stays usable until it expires.
async fn refresh_token(
    State(state): State<SessionState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|token| !token.is_empty())
        .ok_or_else(ApiError::missing_credential)?;

    let subject = match state.jwt.verify_refresh_token(refresh) {
        Ok(subject) => subject,
        Err(e) => {
            debug!(error = %e, "Refresh token rejected");
            // The cookie is useless from now on, tell the client to drop it
            let clear = clear_refresh_cookie(state.secure_cookies);
            return Ok((
                AppendHeaders([(SET_COOKIE, clear)]),
                ApiError::invalid_credential(),
            )
                .into_response());
        }
    };

    let access = state
        .jwt
        .issue_access_token(&subject)
        .token_err("Failed to issue access token")?;

    debug!(subject = %subject, expires_at = access.expires_at, "Access token renewed");

    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            access_token: access.token,
        }),
    )
        .into_response())
}

/// Logout - clear the refresh cookie.
async fn logout(State(state): State<SessionState>) -> impl IntoResponse {
    let clear = clear_refresh_cookie(state.secure_cookies);

    (
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, clear)]),
        Json(serde_json::json!({ "success": true })),
    )
}
