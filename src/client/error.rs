//! Client error types.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Why a renewal attempt failed.
///
/// `Clone` so that one outcome can be handed to every caller queued behind
/// the same renewal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// No refresh token available, locally or according to the server.
    #[error("refresh token missing")]
    MissingCredential,

    /// The server rejected the refresh token (signature, type or expiry).
    #[error("refresh token invalid or expired")]
    InvalidCredential,

    /// Transport failure or unexpected response during the renewal call.
    #[error("renewal request failed: {0}")]
    Network(String),

    /// The renewal call did not finish in time.
    #[error("renewal timed out after {0:?}")]
    TimedOut(Duration),

    /// The renewal task died without reporting an outcome.
    #[error("renewal abandoned")]
    Abandoned,
}

/// Errors returned by [`ApiClient`](super::ApiClient) calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Renewal was needed and failed; the session is over.
    #[error(transparent)]
    Renewal(#[from] RenewalError),

    /// The request was retried with a fresh token and still got 401.
    #[error("request unauthorized after token renewal")]
    UnauthorizedTerminal,

    /// Non-authorization failure status, passed through untouched.
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether this error means the user has to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::Renewal(_) | ClientError::UnauthorizedTerminal
        )
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::UnauthorizedTerminal => Some(StatusCode::UNAUTHORIZED),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }
}
