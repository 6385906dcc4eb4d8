//! Authenticated request wrapper
//!
//! Attaches `Authorization: Bearer` to every call and the CSRF header to
//! every non-GET call, always with credentials included so the auth cookies
//! travel. Every fetch is raced against an abort timeout so a hung network
//! call cannot block the UI. A 401 carrying the TOKEN_EXPIRED code earns
//! exactly one silent refresh and retry; a second failure surfaces as a
//! session-expired error instead of looping.

use std::fmt;

use super::context::SessionContext;

/// Abort in-flight requests after this long
pub const FETCH_TIMEOUT_MS: u32 = 8_000;

/// Header the server validates on unsafe requests
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Error code the server uses for an expired (but well-formed) access token
pub const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

/// Failures surfaced by the request wrapper
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection reset, no window, ...)
    Network(String),
    /// The abort timeout fired before the server answered
    Timeout,
    /// The access token expired and the single refresh-and-retry failed too
    SessionExpired,
    /// The server answered with a non-success status
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(detail) => write!(f, "network error: {detail}"),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::SessionExpired => write!(f, "session expired, please log in again"),
            FetchError::Http {
                status, message, ..
            } => write!(f, "{message} (status {status})"),
        }
    }
}

/// Low-level fetch with the session headers and the abort timeout. The auth
/// endpoints themselves go through this directly; everything else should use
/// [`authenticated_fetch`].
#[cfg(not(feature = "ssr"))]
pub(crate) async fn send(
    method: &str,
    url: &str,
    body: Option<String>,
    bearer: Option<&str>,
    csrf: Option<&str>,
) -> Result<web_sys::Response, FetchError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let window = web_sys::window().ok_or_else(|| FetchError::Network("no window".to_string()))?;

    let controller = web_sys::AbortController::new()
        .map_err(|_| FetchError::Network("failed to create abort controller".to_string()))?;

    let opts = web_sys::RequestInit::new();
    opts.set_method(method);
    opts.set_credentials(web_sys::RequestCredentials::Include);
    opts.set_signal(Some(&controller.signal()));
    if let Some(body) = &body {
        opts.set_body(&wasm_bindgen::JsValue::from_str(body));
    }

    let request = web_sys::Request::new_with_str_and_init(url, &opts)
        .map_err(|err| FetchError::Network(format!("{err:?}")))?;

    let headers = request.headers();
    if body.is_some() {
        headers
            .set("Content-Type", "application/json")
            .map_err(|err| FetchError::Network(format!("{err:?}")))?;
    }
    if let Some(token) = bearer {
        headers
            .set("Authorization", &format!("Bearer {token}"))
            .map_err(|err| FetchError::Network(format!("{err:?}")))?;
    }
    if let Some(token) = csrf {
        headers
            .set(CSRF_HEADER, token)
            .map_err(|err| FetchError::Network(format!("{err:?}")))?;
    }

    let timeout = gloo_timers::callback::Timeout::new(FETCH_TIMEOUT_MS, move || {
        controller.abort();
    });

    let result = JsFuture::from(window.fetch_with_request(&request)).await;
    timeout.cancel();

    match result {
        Ok(value) => value
            .dyn_into::<web_sys::Response>()
            .map_err(|_| FetchError::Network("unexpected fetch result".to_string())),
        Err(err) => {
            let aborted = err
                .dyn_ref::<web_sys::DomException>()
                .map(|e| e.name() == "AbortError")
                .unwrap_or(false);
            if aborted {
                Err(FetchError::Timeout)
            } else {
                Err(FetchError::Network(format!("{err:?}")))
            }
        }
    }
}

/// Wrap an API call with the current access token and CSRF token. Non-2xx
/// responses come back as [`FetchError::Http`]; an expired access token is
/// retried once behind a transparent refresh.
#[cfg(not(feature = "ssr"))]
pub async fn authenticated_fetch(
    session: SessionContext,
    method: &str,
    url: &str,
    body: Option<String>,
) -> Result<web_sys::Response, FetchError> {
    let bearer = session
        .access_token()
        .or_else(super::context::stored_access_token);
    let csrf = if method != "GET" {
        session.csrf_token()
    } else {
        None
    };

    let resp = send(method, url, body.clone(), bearer.as_deref(), csrf.as_deref()).await?;
    if resp.ok() {
        return Ok(resp);
    }

    let err = http_error(resp).await;

    // Only an expired access token earns the transparent retry; a bare 401
    // or any other failure is surfaced as-is.
    if let FetchError::Http {
        status: 401,
        code: Some(ref code),
        ..
    } = err
        && code == TOKEN_EXPIRED_CODE
    {
        // One refresh through the coordinator, one retry, no loops
        let Some(new_token) = session.refresh().await else {
            return Err(FetchError::SessionExpired);
        };

        let retried = send(method, url, body, Some(&new_token), csrf.as_deref()).await?;
        if retried.status() == 401 {
            return Err(FetchError::SessionExpired);
        }
        if retried.ok() {
            return Ok(retried);
        }
        return Err(http_error(retried).await);
    }

    Err(err)
}

#[cfg(not(feature = "ssr"))]
async fn http_error(resp: web_sys::Response) -> FetchError {
    let status = resp.status();
    let fallback = || format!("request failed with status {status}");

    let Ok(promise) = resp.json() else {
        return FetchError::Http {
            status,
            code: None,
            message: fallback(),
        };
    };

    match wasm_bindgen_futures::JsFuture::from(promise).await {
        Ok(value) => {
            let code = js_sys::Reflect::get(&value, &wasm_bindgen::JsValue::from_str("code"))
                .ok()
                .and_then(|v| v.as_string());
            let message = js_sys::Reflect::get(&value, &wasm_bindgen::JsValue::from_str("error"))
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_else(fallback);
            FetchError::Http {
                status,
                code,
                message,
            }
        }
        Err(_) => FetchError::Http {
            status,
            code: None,
            message: fallback(),
        },
    }
}

/// SSR stub - authenticated requests only exist in the browser
#[cfg(feature = "ssr")]
pub async fn authenticated_fetch(
    _session: SessionContext,
    _method: &str,
    _url: &str,
    _body: Option<String>,
) -> Result<(), FetchError> {
    Err(FetchError::Network(
        "authenticated requests are not available during server rendering".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(
            FetchError::Timeout.to_string(),
            "request timed out"
        );
        assert_eq!(
            FetchError::SessionExpired.to_string(),
            "session expired, please log in again"
        );
        assert_eq!(
            FetchError::Network("dns".to_string()).to_string(),
            "network error: dns"
        );
        assert_eq!(
            FetchError::Http {
                status: 404,
                code: Some("USER_NOT_FOUND".to_string()),
                message: "User not found".to_string(),
            }
            .to_string(),
            "User not found (status 404)"
        );
    }

    #[test]
    fn test_timeout_aborts_before_a_user_gives_up() {
        // Long enough for a slow backend, short enough that the UI never
        // hangs on a dead connection
        assert!((5_000..=8_000).contains(&FETCH_TIMEOUT_MS));
    }

    #[test]
    fn test_token_expired_code_matches_server() {
        assert_eq!(TOKEN_EXPIRED_CODE, "TOKEN_EXPIRED");
        assert_eq!(CSRF_HEADER, "x-csrf-token");
    }
}
