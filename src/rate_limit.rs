//! Rate limiting for session endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking so a misbehaving
//! client cannot hammer login or renewal.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket key for requests whose peer address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Interval between limiter pruning runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiting configuration for session endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter shared by login, renewal and logout
    pub session: Arc<IpLimiter>,
    /// Whether to key on `X-Forwarded-For` instead of the socket address
    pub trust_forwarded: bool,
}

impl RateLimitConfig {
    /// Allow `per_second` requests per IP, with a burst of twice that.
    pub fn new(per_second: NonZeroU32, trust_forwarded: bool) -> Self {
        let burst = NonZeroU32::new(per_second.get().saturating_mul(2)).unwrap_or(per_second);
        Self {
            session: Arc::new(RateLimiter::keyed(
                Quota::per_second(per_second).allow_burst(burst),
            )),
            trust_forwarded,
        }
    }

    /// Drop buckets that have fully refilled; they hold no information.
    pub fn prune(&self) {
        self.session.retain_recent();
        self.session.shrink_to_fit();
        debug!(tracked_ips = self.session.len(), "Pruned session rate limiter");
    }
}

/// Spawn a background task that prunes the limiter periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(config: Arc<RateLimitConfig>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            config.prune();
        }
    })
}

/// Middleware for rate limiting session endpoints.
pub async fn rate_limit_session(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request, config.trust_forwarded)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match config.session.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Session rate limit exceeded");
            ApiError::too_many_requests("Too many requests. Please try again later.")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let config = RateLimitConfig::new(NonZeroU32::new(1).unwrap(), false);

        // Burst of two for one request per second
        assert!(config.session.check_key(&"1.2.3.4".to_string()).is_ok());
        assert!(config.session.check_key(&"1.2.3.4".to_string()).is_ok());
        assert!(config.session.check_key(&"1.2.3.4".to_string()).is_err());

        // Other IPs have their own bucket
        assert!(config.session.check_key(&"5.6.7.8".to_string()).is_ok());
    }

    #[test]
    fn test_prune_forgets_idle_clients() {
        let config = RateLimitConfig::new(NonZeroU32::new(1000).unwrap(), false);

        assert!(config.session.check_key(&"1.2.3.4".to_string()).is_ok());
        assert!(config.session.check_key(&"5.6.7.8".to_string()).is_ok());
        assert_eq!(config.session.len(), 2);

        // One request refills in a millisecond at this rate
        std::thread::sleep(Duration::from_millis(50));
        config.prune();
        assert_eq!(config.session.len(), 0);
    }

    #[test]
    fn test_prune_keeps_limited_clients() {
        let config = RateLimitConfig::new(NonZeroU32::new(1).unwrap(), false);
        let ip = "1.2.3.4".to_string();

        assert!(config.session.check_key(&ip).is_ok());
        assert!(config.session.check_key(&ip).is_ok());
        config.prune();

        // Still tracked, so still limited
        assert_eq!(config.session.len(), 1);
        assert!(config.session.check_key(&ip).is_err());
    }
}
