#![allow(dead_code)]

use axum::{Router, extract::Request, middleware, middleware::Next};
use jsonwebtoken::{EncodingKey, Header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokenrelay::{
    ServerConfig,
    client::{ApiClient, ClientConfig},
    create_app,
    jwt::{AccessClaims, JwtConfig, RefreshClaims, TokenType},
};
use url::Url;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-testing-only";
pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new(TEST_SECRET);
    config.frontend_origin = Some(Url::parse(FRONTEND_ORIGIN).expect("Invalid URL"));
    config
}

/// JWT config matching the test server, for minting and checking tokens.
pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(TEST_SECRET)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// A correctly signed access token that expired a minute ago.
pub fn expired_access_token(subject: &str) -> String {
    let now = now();
    let claims = AccessClaims {
        sub: subject.to_string(),
        token_type: TokenType::Access,
        iat: now - 120,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

/// A correctly signed refresh token that expired a minute ago.
pub fn expired_refresh_token(subject: &str) -> String {
    let now = now();
    let claims = RefreshClaims {
        sub: subject.to_string(),
        token_type: TokenType::Refresh,
        iat: now - 120,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

/// Real server on a random port that counts what reaches the renewal endpoint.
pub struct TestServer {
    pub addr: SocketAddr,
    pub renewals: Arc<AtomicUsize>,
    server_handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn api_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("Invalid URL")
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(ClientConfig::new(self.api_url())).expect("Failed to build client")
    }

    pub fn renewal_calls(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// Start the real app, with renewal calls counted and slowed down so that
/// concurrent callers pile up behind the one in flight.
pub async fn spawn_server() -> TestServer {
    spawn_router(create_app(&test_config()), Duration::from_millis(100)).await
}

/// Serve any router the same way, for fakes that misbehave on purpose.
pub async fn spawn_router(router: Router, renewal_delay: Duration) -> TestServer {
    let renewals = Arc::new(AtomicUsize::new(0));
    let counter = renewals.clone();

    let app = router.layer(middleware::from_fn(move |request: Request, next: Next| {
        let counter = counter.clone();
        async move {
            if request.uri().path() == "/api/refresh-token" {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(renewal_delay).await;
            }
            next.run(request).await
        }
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");

    let server_handle = tokio::spawn(async move {
        let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, make_service).await.ok();
    });

    TestServer {
        addr,
        renewals,
        server_handle,
    }
}
