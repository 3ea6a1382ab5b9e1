mod error;
mod profile;
mod session;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_session};

pub use error::ApiError;

/// Create the API router.
///
/// Session endpoints sit behind the per-IP rate limiter when one is given;
/// protected routes only need a valid bearer token.
pub fn create_api_router(
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    login_subject: Arc<str>,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let session_state = session::SessionState {
        jwt: jwt.clone(),
        secure_cookies,
        login_subject,
    };

    let profile_state = profile::ProfileState { jwt };

    let mut session_routes = session::router(session_state);
    if let Some(limits) = rate_limit {
        session_routes =
            session_routes.layer(middleware::from_fn_with_state(limits, rate_limit_session));
    }

    Router::new()
        .merge(session_routes)
        .merge(profile::router(profile_state))
}
