//! Eventra - Event Publishing Platform
//!
//! A web application for creating, publishing and browsing events, built
//! with Leptos and axum. This crate carries the authentication and
//! session-security core: the server side under `core`, the client session
//! layer under `ui`.

pub mod app;
pub mod core;
pub mod ui;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
