//! HTTP client that keeps its session alive on its own.

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::coordinator::{DEFAULT_RENEWAL_TIMEOUT, RefreshCoordinator, TokenRenewer};
use super::error::{ClientError, RenewalError};
use super::state::{AuthState, AuthStatus};
use super::store::{AccessTokenStore, CredentialJar};

const LOGIN_PATH: &str = "login";
const REFRESH_PATH: &str = "refresh-token";
const LOGOUT_PATH: &str = "logout";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api/`
    pub base_url: Url,
    /// Upper bound on one renewal call
    pub renewal_timeout: Duration,
    /// Where an unauthenticated user gets sent
    pub login_path: String,
}

impl ClientConfig {
    pub fn new(mut base_url: Url) -> Self {
        // Url::join drops the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            renewal_timeout: DEFAULT_RENEWAL_TIMEOUT,
            login_path: "/login".to_string(),
        }
    }

    pub fn with_renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = timeout;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }
}

/// A request that can be replayed after a token renewal.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
}

/// Calls `POST /refresh-token`; the cookie jar supplies the refresh cookie.
struct HttpRenewer {
    http: reqwest::Client,
    url: Url,
}

#[async_trait]
impl TokenRenewer for HttpRenewer {
    async fn renew(&self) -> Result<String, RenewalError> {
        let response = self
            .http
            .post(self.url.clone())
            .send()
            .await
            .map_err(|e| RenewalError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = response.json::<ErrorBody>().await.ok();
            return Err(match body.and_then(|b| b.code).as_deref() {
                Some("missing_credential") => RenewalError::MissingCredential,
                _ => RenewalError::InvalidCredential,
            });
        }
        if !status.is_success() {
            return Err(RenewalError::Network(format!("unexpected status {}", status)));
        }

        response
            .json::<TokenResponse>()
            .await
            .map(|body| body.access_token)
            .map_err(|e| RenewalError::Network(e.to_string()))
    }
}

/// API client with bearer interception and single-flight token renewal.
///
/// Cheap to clone; clones share tokens, cookies, auth state and the renewal gate.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: AccessTokenStore,
    credentials: CredentialJar,
    coordinator: RefreshCoordinator,
    auth: AuthState,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let credentials = CredentialJar::new(Arc::new(Jar::default()), config.base_url.clone());
        Self::with_credentials(config, credentials)
    }

    /// Build a client on an existing cookie jar, e.g. one restored from disk.
    pub fn with_credentials(
        config: ClientConfig,
        credentials: CredentialJar,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_provider(credentials.jar())
            .build()?;

        let renewer = Arc::new(HttpRenewer {
            http: http.clone(),
            url: config.base_url.join(REFRESH_PATH)?,
        });

        let tokens = AccessTokenStore::new();
        let auth = AuthState::new(config.login_path.as_str());
        let coordinator = RefreshCoordinator::new(
            renewer,
            tokens.clone(),
            auth.clone(),
            config.renewal_timeout,
        );

        Ok(Self {
            http,
            base_url: config.base_url,
            tokens,
            credentials,
            coordinator,
            auth,
        })
    }

    pub fn tokens(&self) -> &AccessTokenStore {
        &self.tokens
    }

    pub fn credentials(&self) -> &CredentialJar {
        &self.credentials
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Start a session. The access token is kept in the token store, the
    /// refresh token lands in the cookie jar.
    pub async fn login(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.base_url.join(LOGIN_PATH)?)
            .send()
            .await?;
        let body: TokenResponse = check_status(response).await?.json().await?;

        self.tokens.set(body.access_token);
        self.coordinator.clear_failure();
        self.auth.set(AuthStatus::Authenticated);
        info!("Logged in");
        Ok(())
    }

    /// End the session on both sides. Local state is cleared even if the
    /// server cannot be reached.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result: Result<(), ClientError> = match self.base_url.join(LOGOUT_PATH) {
            Ok(url) => match self.http.post(url).send().await {
                Ok(response) => check_status(response).await.map(|_| ()),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        };

        self.tokens.clear();
        self.credentials.forget();
        self.auth.set(AuthStatus::Unauthenticated);
        info!("Logged out");
        result
    }

    /// Resolve the initial auth status.
    ///
    /// A stored access token means authenticated. Without one, a single
    /// renewal is attempted if a refresh cookie exists; the status stays
    /// [`AuthStatus::Loading`] until it settles.
    pub async fn mount(&self) -> AuthStatus {
        if self.tokens.is_present() {
            self.auth.set(AuthStatus::Authenticated);
        } else if !self.credentials.has_refresh_token() {
            self.auth.set(AuthStatus::Unauthenticated);
        } else {
            self.auth.set(AuthStatus::Loading);
            if let Err(e) = self.coordinator.renew(None).await {
                debug!(error = %e, "No session to restore");
            }
        }
        self.auth.status()
    }

    /// Send `request`, renewing the access token once on 401.
    ///
    /// Non-401 failures pass straight through as [`ClientError::Status`].
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let sent_with = self.tokens.get();
        let response = self.execute(request, sent_with.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        if !self.credentials.has_refresh_token() {
            debug!(path = %request.path, "Unauthorized without refresh credential");
            self.tokens.clear();
            self.auth.set(AuthStatus::Unauthenticated);
            return Err(RenewalError::MissingCredential.into());
        }

        let token = self.coordinator.renew(sent_with.as_deref()).await?;

        // Second and final attempt
        let response = self.execute(request, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "Still unauthorized after renewal");
            return Err(ClientError::UnauthorizedTerminal);
        }
        check_status(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Ok(self.send(&ApiRequest::get(path)).await?.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let request = ApiRequest::post(path).json(body);
        Ok(self.send(&request).await?.json().await?)
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let url = self.base_url.join(request.path.trim_start_matches('/'))?;
        let mut builder = authorize(self.http.request(request.method.clone(), url), token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// Request interceptor: attach the access token as a bearer credential.
fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_normalizes_base_url() {
        let config = ClientConfig::new(Url::parse("http://localhost:8000/api").unwrap());
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(
            config.base_url.join("me").unwrap().as_str(),
            "http://localhost:8000/api/me"
        );
    }

    #[test]
    fn test_config_builders() {
        let config = ClientConfig::new(Url::parse("http://localhost:8000/api/").unwrap())
            .with_renewal_timeout(Duration::from_secs(3))
            .with_login_path("/signin");
        assert_eq!(config.renewal_timeout, Duration::from_secs(3));
        assert_eq!(config.login_path, "/signin");
    }

    #[test]
    fn test_authorize_attaches_bearer() {
        let http = reqwest::Client::new();
        let request = authorize(http.get("http://localhost/api/me"), Some("abc"))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer abc"
        );

        let request = authorize(http.get("http://localhost/api/me"), None)
            .build()
            .unwrap();
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_new_client_starts_loading() {
        let client = ApiClient::new(ClientConfig::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
        ))
        .unwrap();
        assert_eq!(client.auth().status(), AuthStatus::Loading);
        assert_eq!(client.mount().await, AuthStatus::Unauthenticated);
        assert_eq!(client.coordinator().renewals_started(), 0);
    }
}
