pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health::api_info))
        .route("/health", get(routes::health::health))
        // Daemon lifecycle
        .route("/api/cron/start", post(routes::cron::start_cron))
        .route("/api/cron/stop", post(routes::cron::stop_cron))
        .route("/api/cron/status", get(routes::cron::cron_status))
        // Execution log
        .route(
            "/api/cron/logs",
            get(routes::cron::get_logs).delete(routes::cron::clear_logs),
        )
        .route("/api/cron/logs/tail", get(routes::cron::tail_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind `host:port` and serve the control API until the process is stopped.
pub async fn serve(app_state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let root = app_state.root.display().to_string();
    let app = build_router(app_state);

    tracing::info!(%local, root = %root, "cronpipe control API listening on http://{local}");

    axum::serve(listener, app).await?;
    Ok(())
}
