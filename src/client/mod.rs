//! Client half: an HTTP client that renews its own access token.
//!
//! [`ApiClient`] attaches the stored access token to every call. When the
//! server answers 401 and a refresh cookie is present, the
//! [`RefreshCoordinator`] makes sure only one renewal runs no matter how many
//! requests failed, then every caller retries once with the new token.
//! [`AuthState`] tracks the resulting status for route guarding.

mod coordinator;
mod error;
mod http;
mod state;
mod store;

pub use coordinator::{DEFAULT_RENEWAL_TIMEOUT, PendingRenewal, RefreshCoordinator, TokenRenewer};
pub use error::{ClientError, RenewalError};
pub use http::{ApiClient, ApiRequest, ClientConfig};
pub use state::{AuthState, AuthStatus, RouteDecision};
pub use store::{AccessTokenStore, CredentialJar};
