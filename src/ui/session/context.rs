//! Session coordinator
//!
//! Owns the client's authentication state: the in-memory access token (with
//! a localStorage mirror for the request wrapper), the CSRF token fetched
//! once per page load, and the user identity. On load it runs a strict
//! sequence: CSRF token first, then a refresh with that freshly fetched
//! token, then a recurring refresh one minute inside the access token's
//! 15-minute window. A refresh failure of any kind drops to anonymous (fail
//! closed); a logout failure still logs out locally (fail open).

use leptos::prelude::*;
#[cfg(not(feature = "ssr"))]
use leptos::task::spawn_local;
use serde::{Deserialize, Serialize};

/// Proactive refresh period: one minute of margin before the 15-minute
/// access token expiry
pub const REFRESH_INTERVAL_MS: u32 = 14 * 60 * 1000;

#[cfg(not(feature = "ssr"))]
const STORAGE_KEY_ACCESS_TOKEN: &str = "eventra_access_token";

/// User identity as the API reports it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Session lifecycle. `Authenticated` holds the user exactly when the last
/// identity fetch succeeded; holding an access token alone proves nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Page load: fetching the CSRF token, nothing else may proceed
    #[default]
    Initializing,
    /// CSRF token in hand, refresh in flight
    Refreshing,
    /// No session (terminal for this load if the CSRF fetch failed)
    Anonymous,
    /// Live session
    Authenticated(User),
}

/// Session context provided at the app root. All fields are signals, so the
/// struct is Copy and can move freely into async tasks and callbacks.
#[derive(Clone, Copy)]
pub struct SessionContext {
    pub state: RwSignal<SessionState>,
    /// Loading flag for user-triggered auth actions
    pub loading: RwSignal<bool>,
    /// Error message from the last auth action
    pub error: RwSignal<Option<String>>,
    access_token: RwSignal<Option<String>>,
    csrf_token: RwSignal<Option<String>>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            state: RwSignal::new(SessionState::default()),
            loading: RwSignal::new(false),
            error: RwSignal::new(None),
            access_token: RwSignal::new(None),
            csrf_token: RwSignal::new(None),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state.get(), SessionState::Authenticated(_))
    }

    pub fn user(&self) -> Option<User> {
        match self.state.get() {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Current access token. Untracked: callers are request paths, not views.
    pub fn access_token(&self) -> Option<String> {
        self.access_token.get_untracked()
    }

    /// CSRF token fetched at startup. Untracked for the same reason.
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token.get_untracked()
    }

    pub fn clear_error(&self) {
        self.error.set(None);
    }
}

/// Provide the session context and start its lifecycle: initialization after
/// hydration, then the proactive refresh timer until the owner is disposed.
pub fn provide_session_context() -> SessionContext {
    // Same defaults on server and client, so hydration sees matching markup
    let ctx = SessionContext::new();

    #[cfg(not(feature = "ssr"))]
    {
        use gloo_timers::callback::Interval;

        Effect::new(move |_| {
            spawn_local(ctx.initialize());
        });

        let interval = Interval::new(REFRESH_INTERVAL_MS, move || {
            spawn_local(async move {
                // Skip until the CSRF bootstrap has produced a token; the
                // init path owns the first refresh.
                if ctx.csrf_token().is_some() {
                    let _ = ctx.refresh().await;
                }
            });
        });
        on_cleanup(move || drop(interval));
    }

    provide_context(ctx);
    ctx
}

/// Get the session context from the component tree
pub fn use_session_context() -> SessionContext {
    expect_context::<SessionContext>()
}

// ============================================================================
// API payloads (client-side mirrors of the auth endpoints)
// ============================================================================

#[derive(Debug, Serialize)]
#[allow(dead_code)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[allow(dead_code)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct CsrfTokenResponse {
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct LoginResponse {
    access_token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct RefreshResponse {
    access_token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ApiErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

// ============================================================================
// Client implementation
// ============================================================================

#[cfg(not(feature = "ssr"))]
impl SessionContext {
    /// Startup sequence: CSRF token first (login/refresh must not proceed
    /// without it), then a refresh using that exact token. A CSRF fetch
    /// failure is terminal for this page load.
    pub async fn initialize(self) {
        self.state.set(SessionState::Initializing);

        let token = match fetch_csrf_token().await {
            Ok(token) => token,
            Err(err) => {
                leptos::logging::warn!("CSRF bootstrap failed: {err}");
                self.clear_session();
                return;
            }
        };
        self.csrf_token.set(Some(token));

        self.state.set(SessionState::Refreshing);
        let _ = self.refresh().await;
    }

    /// The single refresh path shared by startup, the periodic timer and the
    /// request wrapper, so no two callers can disagree about which CSRF
    /// token is current. Returns the new access token while the session
    /// holds; any failure drops to anonymous.
    pub async fn refresh(self) -> Option<String> {
        let csrf = self.csrf_token()?;

        match refresh_session(&csrf).await {
            Ok((access_token, user)) => {
                save_access_token(&access_token);
                self.access_token.set(Some(access_token.clone()));
                self.state.set(SessionState::Authenticated(user));
                Some(access_token)
            }
            Err(err) => {
                leptos::logging::log!("session refresh failed: {err}");
                self.clear_session();
                None
            }
        }
    }

    /// Login with email and password. State changes only on success; the
    /// error is surfaced through the `error` signal and the return value.
    pub async fn login(self, email: &str, password: &str) -> Result<User, String> {
        let Some(csrf) = self.csrf_token() else {
            return Err("Session is still initializing".to_string());
        };

        self.loading.set(true);
        self.error.set(None);

        let result = async {
            let body =
                serde_json::to_string(&LoginRequest { email, password }).map_err(|e| e.to_string())?;
            let resp = super::fetch::send("POST", "/api/auth/login", Some(body), None, Some(&csrf))
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            let json = json_body(&resp).await?;

            if resp.ok() {
                let login: LoginResponse =
                    serde_wasm_bindgen::from_value(json).map_err(|e| e.to_string())?;

                save_access_token(&login.access_token);
                self.access_token.set(Some(login.access_token));
                self.state.set(SessionState::Authenticated(login.user.clone()));
                Ok(login.user)
            } else {
                Err(error_message(json, status))
            }
        }
        .await;

        self.loading.set(false);
        if let Err(ref err) = result {
            self.error.set(Some(err.clone()));
        }
        result
    }

    /// Register a new account. No session is established; the caller sends
    /// the user to the login flow afterwards.
    pub async fn register(self, name: &str, email: &str, password: &str) -> Result<(), String> {
        let Some(csrf) = self.csrf_token() else {
            return Err("Session is still initializing".to_string());
        };

        self.loading.set(true);
        self.error.set(None);

        let result = async {
            let body = serde_json::to_string(&RegisterRequest {
                name,
                email,
                password,
            })
            .map_err(|e| e.to_string())?;
            let resp =
                super::fetch::send("POST", "/api/auth/register", Some(body), None, Some(&csrf))
                    .await
                    .map_err(|e| e.to_string())?;
            let status = resp.status();

            if resp.ok() {
                Ok(())
            } else {
                let json = json_body(&resp).await?;
                Err(error_message(json, status))
            }
        }
        .await;

        self.loading.set(false);
        if let Err(ref err) = result {
            self.error.set(Some(err.clone()));
        }
        result
    }

    /// Logout. Local state is cleared no matter what the server said: the
    /// user must always be able to exit a stuck session.
    pub async fn logout(self) {
        if let Some(csrf) = self.csrf_token() {
            if let Err(err) =
                super::fetch::send("POST", "/api/auth/logout", None, None, Some(&csrf)).await
            {
                leptos::logging::warn!("logout request failed: {err}");
            }
        }

        self.clear_session();
    }

    fn clear_session(self) {
        clear_access_token();
        self.access_token.set(None);
        self.state.set(SessionState::Anonymous);
    }
}

#[cfg(not(feature = "ssr"))]
async fn fetch_csrf_token() -> Result<String, String> {
    let resp = super::fetch::send("GET", "/api/auth/csrf-token", None, None, None)
        .await
        .map_err(|e| e.to_string())?;
    if !resp.ok() {
        return Err(format!("csrf endpoint returned {}", resp.status()));
    }

    let json = json_body(&resp).await?;
    let parsed: CsrfTokenResponse =
        serde_wasm_bindgen::from_value(json).map_err(|e| e.to_string())?;
    Ok(parsed.csrf_token)
}

/// Exchange the refresh cookie for a new access token, then fetch the
/// identity it belongs to. `user` is only ever set from a successful
/// identity fetch.
#[cfg(not(feature = "ssr"))]
async fn refresh_session(csrf: &str) -> Result<(String, User), String> {
    let resp = super::fetch::send("POST", "/api/auth/refresh-token", None, None, Some(csrf))
        .await
        .map_err(|e| e.to_string())?;
    let status = resp.status();
    let json = json_body(&resp).await?;
    if status != 200 {
        return Err(error_message(json, status));
    }

    let refresh: RefreshResponse =
        serde_wasm_bindgen::from_value(json).map_err(|e| e.to_string())?;

    let resp = super::fetch::send(
        "GET",
        "/api/auth/me",
        None,
        Some(&refresh.access_token),
        None,
    )
    .await
    .map_err(|e| e.to_string())?;
    let status = resp.status();
    let json = json_body(&resp).await?;
    if status != 200 {
        return Err(error_message(json, status));
    }

    let user: User = serde_wasm_bindgen::from_value(json).map_err(|e| e.to_string())?;
    Ok((refresh.access_token, user))
}

#[cfg(not(feature = "ssr"))]
async fn json_body(resp: &web_sys::Response) -> Result<wasm_bindgen::JsValue, String> {
    let promise = resp
        .json()
        .map_err(|_| "response body is not JSON".to_string())?;
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|_| "failed to read response body".to_string())
}

#[cfg(not(feature = "ssr"))]
fn error_message(json: wasm_bindgen::JsValue, status: u16) -> String {
    serde_wasm_bindgen::from_value::<ApiErrorBody>(json)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("request failed with status {status}"))
}

// ============================================================================
// localStorage mirror of the access token
// ============================================================================

#[cfg(not(feature = "ssr"))]
fn save_access_token(token: &str) {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            let _ = storage.set_item(STORAGE_KEY_ACCESS_TOKEN, token);
        }
    }
}

#[cfg(not(feature = "ssr"))]
fn clear_access_token() {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            let _ = storage.remove_item(STORAGE_KEY_ACCESS_TOKEN);
        }
    }
}

/// Read the mirrored access token; the request wrapper falls back to this
/// when it runs before the context signals have been populated.
#[cfg(not(feature = "ssr"))]
pub(crate) fn stored_access_token() -> Option<String> {
    let window = web_sys::window()?;
    let storage = window.local_storage().ok()??;
    storage.get_item(STORAGE_KEY_ACCESS_TOKEN).ok()?
}

// ============================================================================
// SSR stubs - auth actions only exist in the browser
// ============================================================================

#[cfg(feature = "ssr")]
impl SessionContext {
    pub async fn initialize(self) {}

    pub async fn refresh(self) -> Option<String> {
        None
    }

    pub async fn login(self, _email: &str, _password: &str) -> Result<User, String> {
        Err("Login is not available during server rendering".to_string())
    }

    pub async fn register(
        self,
        _name: &str,
        _email: &str,
        _password: &str,
    ) -> Result<(), String> {
        Err("Registration is not available during server rendering".to_string())
    }

    pub async fn logout(self) {}
}

#[cfg(feature = "ssr")]
#[allow(dead_code)]
pub(crate) fn stored_access_token() -> Option<String> {
    None
}
