use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use cronpipe_core::CronError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// The body is always `{error: true, detail, timestamp, kind}`. `kind` is the
/// [`CronError::kind`] name, or `internal` for anything else.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(CronError::Validation(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.downcast_ref::<CronError>() {
            Some(e) => {
                let status = match e {
                    CronError::InvalidInterval { .. } | CronError::Validation(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    // State conflicts stay 500; `kind` tells them apart.
                    CronError::AlreadyRunning { .. }
                    | CronError::NotRunning
                    | CronError::SpawnFailed(_)
                    | CronError::TerminateFailed { .. }
                    | CronError::InvalidConfig(_)
                    | CronError::Io(_)
                    | CronError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::error!(kind, error = %format!("{:#}", self.0), "request failed");
        }

        let body = serde_json::json!({
            "error": true,
            "detail": self.0.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "kind": kind,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
