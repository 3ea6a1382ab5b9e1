//! Bearer authentication for protected API routes.
//!
//! Dual-token system: short-lived access tokens travel in the
//! `Authorization` header and are verified statelessly; long-lived refresh
//! tokens live only in an HttpOnly cookie and are exchanged for new access
//! tokens by the session endpoints.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;

pub(crate) use cookie::find_cookie;
pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::ApiAuthError;
pub use extractors::{Auth, bearer_token};
pub use ip::extract_client_ip;
pub use state::HasAuthBackend;
