#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::http::{HeaderName, HeaderValue, Method, header};
    use axum::routing::get;
    use eventra::app::{App, shell};
    use eventra::core::auth::{AuthApiState, AuthService, JwtService, LoginRateLimiter, auth_api_router};
    use eventra::core::config::Config;
    use eventra::core::db::{
        DbConfig, RefreshTokenRepository, UserRepository, create_pool_with_migrations,
    };
    use eventra::core::mailer::Mailer;
    use leptos::logging::log;
    use leptos::prelude::*;
    use leptos_axum::{LeptosRoutes, generate_route_list};
    use tower_http::compression::CompressionLayer;
    use tower_http::cors::CorsLayer;

    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load application config from environment variables
    let config = Config::from_env();
    tracing::info!(
        "config loaded: database={}, client_url={}",
        config.has_database(),
        config.client_url()
    );

    // Leptos configuration from Cargo.toml [package.metadata.leptos];
    // overridable via LEPTOS_SITE_ADDR for Docker/K8s
    let conf = get_configuration(None).unwrap();
    let leptos_options = conf.leptos_options;
    let addr = leptos_options.site_addr;

    // Database pool with embedded migrations
    let db_config = DbConfig::from_env().expect("DATABASE_URL must be set");
    let pool = create_pool_with_migrations(&db_config)
        .await
        .expect("failed to connect to the database");

    // Auth stack: codec, repositories, service, login limiter
    let codec = JwtService::from_env().expect("token secrets must be set");
    let mailer = Mailer::new(config.client_url());
    let auth_service = AuthService::new(
        UserRepository::new(pool.clone()),
        RefreshTokenRepository::new(pool.clone()),
        codec,
        mailer,
    );
    let auth_state = AuthApiState {
        auth_service,
        login_limiter: LoginRateLimiter::default(),
    };

    // Credentialed CORS for the browser client. Both auth cookies are
    // SameSite=None, so the allowed origin must be explicit, never "*".
    let client_origin = config
        .client_url()
        .parse::<HeaderValue>()
        .expect("CLIENT_URL must be a valid origin");
    let cors = CorsLayer::new()
        .allow_origin(client_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
        ]);

    // Generate the list of routes in the Leptos App
    let routes = generate_route_list(App);

    let leptos_router = Router::new()
        .leptos_routes(&leptos_options, routes, {
            let leptos_options = leptos_options.clone();
            move || shell(leptos_options.clone())
        })
        .fallback(leptos_axum::file_and_error_handler(shell))
        .with_state(leptos_options);

    let health_router = Router::new()
        .route("/api/health", get(health_handler))
        .with_state(pool.clone());

    let app = Router::new()
        .merge(auth_api_router(auth_state))
        .merge(health_router)
        .merge(leptos_router)
        .layer(cors)
        .layer(CompressionLayer::new());

    log!("listening on http://{}", &addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

/// GET /api/health - database liveness probe
#[cfg(feature = "ssr")]
async fn health_handler(
    axum::extract::State(pool): axum::extract::State<sqlx::PgPool>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;

    match eventra::core::db::health_check(&pool).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::error!("health check failed: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

#[cfg(not(feature = "ssr"))]
pub fn main() {
    // no client-side main function
    // see lib.rs for the hydration entry point instead
}
