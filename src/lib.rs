pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use jwt::{JwtConfig, TokenLifetimes};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;

pub struct ServerConfig {
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access and refresh token lifetimes
    pub lifetimes: TokenLifetimes,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// The single browser origin allowed to make credentialed cross-origin calls
    pub frontend_origin: Option<Url>,
    /// Subject identity that `POST /api/login` issues tokens for
    pub login_subject: String,
    /// Per-IP requests per second on session endpoints; `None` disables limiting
    pub session_rate_limit: Option<NonZeroU32>,
    /// Key rate limiting on `X-Forwarded-For` (requires running behind a proxy)
    pub trust_forwarded: bool,
}

impl ServerConfig {
    /// Configuration with defaults for everything but the secret.
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            lifetimes: TokenLifetimes::default(),
            secure_cookies: false,
            frontend_origin: None,
            login_subject: "1".to_string(),
            session_rate_limit: None,
            trust_forwarded: false,
        }
    }
}

/// CORS policy: credentials only from the one configured frontend origin.
fn cors_layer(origin: &Url) -> Option<CorsLayer> {
    // Url::origin drops the path and trailing slash browsers never send
    let origin = origin.origin().ascii_serialization();
    let origin = match HeaderValue::from_str(&origin) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(origin = %origin, error = %e, "Invalid frontend origin, CORS disabled");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([origin]))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

/// Per-IP limiter for the session endpoints, if one is configured.
fn session_rate_limit(config: &ServerConfig) -> Option<Arc<RateLimitConfig>> {
    config
        .session_rate_limit
        .map(|per_second| Arc::new(RateLimitConfig::new(per_second, config.trust_forwarded)))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    build_app(config, session_rate_limit(config))
}

fn build_app(config: &ServerConfig, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let jwt = Arc::new(JwtConfig::with_lifetimes(
        &config.jwt_secret,
        config.lifetimes,
    ));

    let api_router = create_api_router(
        jwt,
        config.secure_cookies,
        Arc::from(config.login_subject.as_str()),
        rate_limit,
    );

    let app = Router::new().nest("/api", api_router);

    match config.frontend_origin.as_ref().and_then(cors_layer) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let rate_limit = session_rate_limit(&config);
    let cleanup = rate_limit.clone().map(rate_limit::spawn_cleanup_scheduler);

    let app = build_app(&config, rate_limit);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, make_service).await;

    if let Some(cleanup) = cleanup {
        cleanup.abort();
    }
    result
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> std::io::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
