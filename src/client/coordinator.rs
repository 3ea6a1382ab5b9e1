//! Single-flight access token renewal.
//!
//! When many requests hit an expired access token at once, only the first
//! one to report the failure starts a renewal. Everyone else is parked on a
//! [`PendingRenewal`] record and receives exactly the same outcome: the one
//! new token, or the one error.
//!
//! The enqueue-or-initiate decision is made under a `std::sync::Mutex` that
//! is never held across an `.await`, so the gate cannot be observed half-set
//! from another worker thread. The renewal itself runs in a spawned task:
//! cancelling the caller that triggered it cannot strand the queue.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::RenewalError;
use super::state::{AuthState, AuthStatus};
use super::store::AccessTokenStore;

/// Default bound on a single renewal call.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can exchange the refresh credential for a new access token.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self) -> Result<String, RenewalError>;
}

/// A caller waiting on the renewal in flight.
#[derive(Debug)]
pub struct PendingRenewal {
    tx: oneshot::Sender<Result<String, RenewalError>>,
}

impl PendingRenewal {
    fn new() -> (Self, oneshot::Receiver<Result<String, RenewalError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn resolve(self, token: String) {
        // The waiter may have been cancelled; nothing to deliver then
        let _ = self.tx.send(Ok(token));
    }

    pub fn reject(self, error: RenewalError) {
        let _ = self.tx.send(Err(error));
    }
}

/// A renewal that failed for requests carrying `token`.
#[derive(Debug)]
struct Failure {
    token: String,
    error: RenewalError,
}

#[derive(Debug, Default)]
struct Gate {
    in_flight: bool,
    /// Token the renewal in flight is replacing
    replacing: Option<String>,
    queue: Vec<PendingRenewal>,
    last_failure: Option<Failure>,
}

struct Inner {
    renewer: Arc<dyn TokenRenewer>,
    tokens: AccessTokenStore,
    auth: AuthState,
    timeout: Duration,
    gate: Mutex<Gate>,
    renewals: AtomicU64,
}

/// Owns the refresh-in-progress gate and the pending queue for one client.
///
/// Cheap to clone; clones share the same gate.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

enum Decision {
    Reuse(String),
    Fail(RenewalError),
    Wait(oneshot::Receiver<Result<String, RenewalError>>),
}

impl RefreshCoordinator {
    pub fn new(
        renewer: Arc<dyn TokenRenewer>,
        tokens: AccessTokenStore,
        auth: AuthState,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                renewer,
                tokens,
                auth,
                timeout,
                gate: Mutex::new(Gate::default()),
                renewals: AtomicU64::new(0),
            }),
        }
    }

    /// Get a fresh access token after `rejected` was refused by the server.
    ///
    /// If a renewal already replaced `rejected` with another token, that
    /// token is returned without a network call. If the last renewal for
    /// `rejected` failed, its error is returned the same way. If a renewal
    /// is in flight the caller joins it. Otherwise this caller starts one.
    pub async fn renew(&self, rejected: Option<&str>) -> Result<String, RenewalError> {
        let decision = {
            let mut gate = self.inner.lock_gate();
            let failed = match (&gate.last_failure, rejected) {
                (Some(failure), Some(rejected)) if !gate.in_flight && failure.token == rejected => {
                    Some(failure.error.clone())
                }
                _ => None,
            };
            match (failed, self.inner.tokens.get()) {
                (Some(error), _) => Decision::Fail(error),
                (None, Some(current)) if !gate.in_flight && rejected != Some(current.as_str()) => {
                    Decision::Reuse(current)
                }
                _ => {
                    let (pending, rx) = PendingRenewal::new();
                    gate.queue.push(pending);
                    if gate.in_flight {
                        debug!(queued = gate.queue.len(), "Renewal in flight, waiting");
                    } else {
                        gate.in_flight = true;
                        gate.replacing = rejected.map(str::to_owned);
                        let inner = Arc::clone(&self.inner);
                        tokio::spawn(async move { inner.run().await });
                    }
                    Decision::Wait(rx)
                }
            }
        };

        match decision {
            Decision::Reuse(token) => {
                debug!("Access token already renewed, reusing it");
                Ok(token)
            }
            Decision::Fail(error) => {
                debug!(error = %error, "Renewal for this token already failed");
                Err(error)
            }
            Decision::Wait(rx) => rx.await.unwrap_or(Err(RenewalError::Abandoned)),
        }
    }

    /// Whether a renewal is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_gate().in_flight
    }

    /// Forget a failed renewal, e.g. after a fresh login.
    pub fn clear_failure(&self) {
        self.inner.lock_gate().last_failure = None;
    }

    /// Number of callers waiting on the renewal in flight.
    pub fn queued(&self) -> usize {
        self.inner.lock_gate().queue.len()
    }

    /// Total renewal calls started by this coordinator.
    pub fn renewals_started(&self) -> u64 {
        self.inner.renewals.load(Ordering::Relaxed)
    }
}

impl Inner {
    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>) {
        let attempt = self.renewals.fetch_add(1, Ordering::Relaxed) + 1;
        info!(attempt, "Renewing access token");

        let outcome = AssertUnwindSafe(self.call_renewer())
            .catch_unwind()
            .await
            .unwrap_or(Err(RenewalError::Abandoned));

        self.finish(outcome);
    }

    async fn call_renewer(&self) -> Result<String, RenewalError> {
        match tokio::time::timeout(self.timeout, self.renewer.renew()).await {
            Ok(result) => result,
            Err(_) => Err(RenewalError::TimedOut(self.timeout)),
        }
    }

    /// Publish the outcome, reopen the gate, then wake every waiter.
    fn finish(&self, outcome: Result<String, RenewalError>) {
        match &outcome {
            Ok(token) => {
                self.tokens.set(token.clone());
                self.auth.set(AuthStatus::Authenticated);
            }
            Err(_) => {
                self.tokens.clear();
                self.auth.set(AuthStatus::Unauthenticated);
            }
        }

        let waiters = {
            let mut gate = self.lock_gate();
            gate.in_flight = false;
            let replacing = gate.replacing.take();
            gate.last_failure = match (&outcome, replacing) {
                (Err(error), Some(token)) => Some(Failure {
                    token,
                    error: error.clone(),
                }),
                _ => None,
            };
            std::mem::take(&mut gate.queue)
        };

        match outcome {
            Ok(token) => {
                info!(waiters = waiters.len(), "Access token renewed");
                for waiter in waiters {
                    waiter.resolve(token.clone());
                }
            }
            Err(error) => {
                warn!(waiters = waiters.len(), error = %error, "Access token renewal failed");
                for waiter in waiters {
                    waiter.reject(error.clone());
                }
            }
        }
    }
}
