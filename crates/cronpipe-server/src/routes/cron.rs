use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use cronpipe_core::log_store::last_lines;
use cronpipe_core::process::Termination;
use cronpipe_core::supervisor::DaemonStatus;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const NO_LOGS: &str = "No logs available yet";
const DEFAULT_TAIL_LINES: i64 = 50;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub interval_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinesQuery {
    #[serde(default)]
    pub lines: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl ActionResponse {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            pid: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: String,
    pub line_count: usize,
}

/// Run a blocking core call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> cronpipe_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let out = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(out)
}

/// Interval from a start body; an empty body means the configured default.
fn requested_interval(body: &[u8], default: u64) -> Result<i64, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(default as i64);
    }
    let req: StartRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("malformed request body: {e}")))?;
    Ok(req.interval_seconds.unwrap_or(default as i64))
}

fn lines_param(query: Result<Query<LinesQuery>, QueryRejection>) -> Result<Option<i64>, AppError> {
    let Query(q) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok(q.lines)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/cron/start: spawn the daemon. Body: `{"interval_seconds": N}`.
pub async fn start_cron(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<ActionResponse>, AppError> {
    let interval = requested_interval(&body, app.config.default_interval_seconds)?;
    let supervisor = app.supervisor.clone();
    let handle = blocking(move || supervisor.start(interval)).await?;

    let mut resp = ActionResponse::new(
        true,
        format!(
            "Daemon started successfully with interval: {} seconds (PID: {})",
            handle.interval_seconds, handle.pid
        ),
    );
    resp.pid = Some(handle.pid);
    Ok(Json(resp))
}

/// POST /api/cron/stop
pub async fn stop_cron(State(app): State<AppState>) -> Result<Json<ActionResponse>, AppError> {
    let supervisor = app.supervisor.clone();
    let outcome = blocking(move || supervisor.stop()).await?;
    let message = match outcome {
        Termination::Graceful => "Daemon stopped successfully".to_string(),
        Termination::Forced => format!(
            "Daemon stopped successfully (killed after {}s grace period)",
            app.config.stop_grace_seconds
        ),
        Termination::AlreadyExited => "Daemon had already exited".to_string(),
    };
    Ok(Json(ActionResponse::new(true, message)))
}

/// GET /api/cron/status
pub async fn cron_status(State(app): State<AppState>) -> Result<Json<DaemonStatus>, AppError> {
    let supervisor = app.supervisor.clone();
    let status = blocking(move || supervisor.status()).await?;
    Ok(Json(status))
}

/// GET /api/cron/logs?lines=N: whole log, or the last N lines when N > 0.
pub async fn get_logs(
    State(app): State<AppState>,
    query: Result<Query<LinesQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, AppError> {
    let lines = lines_param(query)?;
    let logs = app.logs.clone();
    let text = blocking(move || {
        if !logs.exists() {
            return Ok(None);
        }
        logs.read_all().map(Some)
    })
    .await?;

    let Some(text) = text else {
        return Ok(Json(LogsResponse {
            logs: NO_LOGS.to_string(),
            line_count: 0,
        }));
    };
    let text = match lines {
        Some(n) if n > 0 => last_lines(&text, n as usize),
        _ => text,
    };
    let line_count = text.lines().count();
    Ok(Json(LogsResponse {
        logs: text,
        line_count,
    }))
}

/// GET /api/cron/logs/tail?lines=N: last N lines (default 50) as plain text.
/// Like `/logs`, N <= 0 means the whole log.
pub async fn tail_logs(
    State(app): State<AppState>,
    query: Result<Query<LinesQuery>, QueryRejection>,
) -> Result<String, AppError> {
    let lines = lines_param(query)?.unwrap_or(DEFAULT_TAIL_LINES);
    let logs = app.logs.clone();
    blocking(move || {
        if !logs.exists() {
            return Ok(NO_LOGS.to_string());
        }
        if lines > 0 {
            logs.read_last(lines as usize)
        } else {
            logs.read_all()
        }
    })
    .await
}

/// DELETE /api/cron/logs
pub async fn clear_logs(State(app): State<AppState>) -> Result<Json<ActionResponse>, AppError> {
    let logs = app.logs.clone();
    let cleared = blocking(move || logs.clear()).await?;
    Ok(Json(if cleared {
        ActionResponse::new(true, "Logs cleared successfully")
    } else {
        ActionResponse::new(false, "No log file to clear")
    }))
}
