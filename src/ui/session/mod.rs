//! Client session layer
//!
//! `context` owns the session lifecycle (CSRF bootstrap, refresh scheduling,
//! login/logout); `fetch` wraps outgoing API calls with the credentials the
//! server expects and a single transparent retry after token expiry.

mod context;
mod fetch;

pub use context::{
    REFRESH_INTERVAL_MS, SessionContext, SessionState, User, provide_session_context,
    use_session_context,
};
pub use fetch::{FETCH_TIMEOUT_MS, FetchError, authenticated_fetch};
