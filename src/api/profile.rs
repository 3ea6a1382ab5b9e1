//! Protected profile endpoint.
//!
//! - GET `/me` - Echo the subject of the presented access token

use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::Auth;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProfileState {
    pub jwt: Arc<JwtConfig>,
}

crate::impl_has_auth_backend!(ProfileState);

pub fn router(state: ProfileState) -> Router {
    Router::new().route("/me", get(me)).with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    subject: String,
    expires_at: u64,
}

async fn me(Auth(claims): Auth) -> Json<MeResponse> {
    Json(MeResponse {
        subject: claims.sub,
        expires_at: claims.exp,
    })
}
