use axum::Json;
use chrono::Utc;

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /: API information.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "cronpipe",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Control API for the scheduled pipeline daemon",
        "endpoints": {
            "POST /api/cron/start": "Start the daemon with the given interval",
            "POST /api/cron/stop": "Stop the running daemon",
            "GET /api/cron/status": "Daemon status",
            "GET /api/cron/logs": "Execution log, optionally the last N lines",
            "GET /api/cron/logs/tail": "Last N lines of the execution log as plain text",
            "DELETE /api/cron/logs": "Clear the execution log",
            "GET /health": "Liveness probe",
        },
    }))
}
