use leptos::prelude::*;
use leptos_meta::{MetaTags, Stylesheet, Title, provide_meta_context};
use leptos_router::{
    components::{Route, Router, Routes},
    path,
};

use crate::ui::session::{SessionState, provide_session_context, use_session_context};

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                <AutoReload options=options.clone() />
                <HydrationScripts options/>
                <MetaTags/>
            </head>
            <body>
                <App/>
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();

    // Session context owns the auth lifecycle: CSRF bootstrap, the initial
    // refresh, and the proactive refresh timer. Everything below it in the
    // tree consumes it via use_session_context().
    let _session = provide_session_context();

    view! {
        <Stylesheet id="leptos" href="/pkg/eventra.css"/>

        <Title text="Eventra - Discover and publish events"/>

        <Router>
            <main class="w-full min-h-screen">
                <Routes fallback=|| "Not found.">
                    <Route path=path!("") view=HomePage/>
                </Routes>
            </main>
        </Router>
    }
}

/// Landing page shell. The event browsing and publishing screens mount here;
/// the session banner below is what they key their gated actions on.
#[component]
fn HomePage() -> impl IntoView {
    let session = use_session_context();

    let status = move || match session.state.get() {
        SessionState::Initializing | SessionState::Refreshing => "Restoring session...".to_string(),
        SessionState::Anonymous => "Signed out".to_string(),
        SessionState::Authenticated(user) => format!("Signed in as {}", user.name),
    };

    view! {
        <header class="app-header">
            <h1>"Eventra"</h1>
            <p class="session-status">{status}</p>
        </header>
    }
}
