//! Authentication status for UI gating.

use std::sync::Arc;
use tokio::sync::watch;

/// Where the client stands with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Not yet known; a renewal may be running.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// What a protected view should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Status still loading, render a placeholder.
    Pending,
    /// Render the protected view.
    Allow,
    /// Send the user to the login entry point.
    RedirectToLogin(String),
}

/// Observable authentication status.
///
/// Backed by a `watch` channel: clones share the same status and any number
/// of observers can [`subscribe`](Self::subscribe) to changes.
#[derive(Debug, Clone)]
pub struct AuthState {
    tx: Arc<watch::Sender<AuthStatus>>,
    login_path: Arc<str>,
}

impl AuthState {
    /// Starts in [`AuthStatus::Loading`].
    pub fn new(login_path: impl Into<Arc<str>>) -> Self {
        let (tx, _rx) = watch::channel(AuthStatus::Loading);
        Self {
            tx: Arc::new(tx),
            login_path: login_path.into(),
        }
    }

    pub fn status(&self) -> AuthStatus {
        *self.tx.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn set(&self, status: AuthStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(from = ?current, to = ?status, "Auth status changed");
            *current = status;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }

    /// Route guard for protected views.
    pub fn guard(&self) -> RouteDecision {
        match self.status() {
            AuthStatus::Loading => RouteDecision::Pending,
            AuthStatus::Authenticated => RouteDecision::Allow,
            AuthStatus::Unauthenticated => RouteDecision::RedirectToLogin(self.login_path.to_string()),
        }
    }

    /// Wait until the status is no longer [`AuthStatus::Loading`].
    pub async fn wait_until_resolved(&self) -> AuthStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(|status| *status != AuthStatus::Loading).await {
            Ok(status) => *status,
            // The sender lives in self, so the channel cannot close here
            Err(_) => self.status(),
        }
    }
}
