//! Client-side credential storage.
//!
//! The access token lives in [`AccessTokenStore`], readable by any code that
//! needs to attach it. The refresh token lives only in the HTTP cookie jar;
//! [`CredentialJar`] can tell whether one is present but never hands out its
//! value.

use reqwest::cookie::{CookieStore, Jar};
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

use crate::auth::{REFRESH_COOKIE_NAME, find_cookie};

/// Shared, cloneable slot for the current access token.
#[derive(Debug, Clone, Default)]
pub struct AccessTokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl AccessTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_present(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// The protected store: the cookie jar the HTTP client sends from.
#[derive(Debug, Clone)]
pub struct CredentialJar {
    jar: Arc<Jar>,
    url: Url,
}

impl CredentialJar {
    /// Wrap `jar`, scoping presence checks to the API at `url`.
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }

    pub(crate) fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Whether a refresh cookie would be sent with a request to the API.
    pub fn has_refresh_token(&self) -> bool {
        let Some(header) = self.jar.cookies(&self.url) else {
            return false;
        };
        header
            .to_str()
            .ok()
            .and_then(|cookies| find_cookie(cookies, REFRESH_COOKIE_NAME))
            .is_some_and(|value| !value.is_empty())
    }

    /// Drop the refresh cookie locally.
    pub fn forget(&self) {
        let expired = format!("{}=; HttpOnly; Path=/; Max-Age=0", REFRESH_COOKIE_NAME);
        self.jar.add_cookie_str(&expired, &self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_url() -> Url {
        Url::parse("http://127.0.0.1:8000/api/").unwrap()
    }

    #[test]
    fn test_access_token_store_shared_between_clones() {
        let store = AccessTokenStore::new();
        let other = store.clone();

        assert!(!store.is_present());
        store.set("abc");
        assert_eq!(other.get().as_deref(), Some("abc"));

        other.clear();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_credential_jar_presence() {
        let jar = Arc::new(Jar::default());
        let credentials = CredentialJar::new(jar.clone(), api_url());
        assert!(!credentials.has_refresh_token());

        jar.add_cookie_str(
            "refresh_token=xyz; HttpOnly; SameSite=Strict; Path=/; Max-Age=600",
            &api_url(),
        );
        assert!(credentials.has_refresh_token());

        credentials.forget();
        assert!(!credentials.has_refresh_token());
    }

    #[test]
    fn test_other_cookies_do_not_count() {
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("theme=dark; Path=/", &api_url());

        let credentials = CredentialJar::new(jar, api_url());
        assert!(!credentials.has_refresh_token());
    }
}
