use axum::http::StatusCode;
use cronpipe_core::config::Config;
use cronpipe_core::log_store::LogStore;
use cronpipe_core::process::DaemonLaunch;
use cronpipe_server::{build_router, AppState};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// App state whose "daemon" is a plain `sleep`, so no real pipeline runs.
fn test_state(dir: &TempDir) -> AppState {
    let mut config = Config::default();
    config.stop_grace_seconds = 5;
    let launch = DaemonLaunch::new("sh", dir.path())
        .arg("-c")
        .arg("sleep 30");
    AppState::new(dir.path().to_path_buf(), config, launch)
}

fn log_store(dir: &TempDir) -> LogStore {
    LogStore::new(dir.path().join("pipeline_execution.log"))
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: axum::body::Body,
) -> (StatusCode, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, "GET", uri, axum::body::Body::empty()).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a GET request and return the body as text.
async fn get_text(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let (status, body) = send(app, "GET", uri, axum::body::Body::empty()).await;
    (status, String::from_utf8(body).unwrap())
}

/// Send a POST request with a raw body and return (status, parsed JSON body).
async fn post(app: axum::Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, "POST", uri, axum::body::Body::from(body.to_string())).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn delete(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, "DELETE", uri, axum::body::Body::empty()).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_healthy() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(build_router(test_state(&dir)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn root_lists_endpoints() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(build_router(test_state(&dir)), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "cronpipe");
    assert!(json["endpoints"]["POST /api/cron/start"].is_string());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_status_stop_round() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir));

    let (status, json) = post(app.clone(), "/api/cron/start", r#"{"interval_seconds": 10}"#).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    let pid = json["pid"].as_u64().unwrap();
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("interval: 10 seconds"));

    let (status, json) = get(app.clone(), "/api/cron/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_running"], true);
    assert_eq!(json["pid"].as_u64(), Some(pid));
    assert_eq!(json["message"], format!("Daemon is running (PID: {pid})"));

    let (status, json) = post(app.clone(), "/api/cron/stop", "").await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Daemon stopped successfully");

    let (_, json) = get(app, "/api/cron/status").await;
    assert_eq!(json["is_running"], false);
    assert!(json["pid"].is_null());
    assert_eq!(json["message"], "Daemon is not running");
}

#[tokio::test]
async fn start_below_minimum_is_400() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir));

    let (status, json) = post(app.clone(), "/api/cron/start", r#"{"interval_seconds": 5}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);
    assert_eq!(json["kind"], "validation");
    assert!(json["detail"].as_str().unwrap().contains("at least 10"));

    let (_, json) = get(app, "/api/cron/status").await;
    assert_eq!(json["is_running"], false);
}

#[tokio::test]
async fn malformed_start_body_is_400() {
    let dir = TempDir::new().unwrap();
    let (status, json) = post(
        build_router(test_state(&dir)),
        "/api/cron/start",
        "{interval_seconds: ten",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn second_start_is_500_already_running() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir));

    let (status, _) = post(app.clone(), "/api/cron/start", r#"{"interval_seconds": 30}"#).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = post(app.clone(), "/api/cron/start", r#"{"interval_seconds": 30}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "already_running");

    let (status, _) = post(app, "/api/cron/stop", "").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn stop_when_not_running_is_500_not_running() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir));
    for _ in 0..2 {
        let (status, json) = post(app.clone(), "/api/cron/stop", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], true);
        assert_eq!(json["kind"], "not_running");
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logs_without_file_say_so() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir));

    let (status, json) = get(app.clone(), "/api/cron/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["logs"], "No logs available yet");
    assert_eq!(json["line_count"], 0);

    let (status, text) = get_text(app, "/api/cron/logs/tail").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "No logs available yet");
}

#[tokio::test]
async fn logs_return_all_or_last_n() {
    let dir = TempDir::new().unwrap();
    let logs = log_store(&dir);
    for i in 0..8 {
        logs.append(&format!("record {i}")).unwrap();
    }
    let app = build_router(test_state(&dir));

    let (_, json) = get(app.clone(), "/api/cron/logs").await;
    assert_eq!(json["line_count"], 8);

    let (_, json) = get(app.clone(), "/api/cron/logs?lines=3").await;
    assert_eq!(json["line_count"], 3);
    let text = json["logs"].as_str().unwrap();
    assert!(text.lines().next().unwrap().ends_with("record 5"));
    assert!(text.lines().last().unwrap().ends_with("record 7"));

    let (_, json) = get(app, "/api/cron/logs?lines=0").await;
    assert_eq!(json["line_count"], 8, "non-positive lines means whole log");
}

#[tokio::test]
async fn tail_is_plain_text_with_default_and_bounds() {
    let dir = TempDir::new().unwrap();
    let logs = log_store(&dir);
    for i in 0..60 {
        logs.append(&format!("record {i}")).unwrap();
    }
    let app = build_router(test_state(&dir));

    let (status, text) = get_text(app.clone(), "/api/cron/logs/tail").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text.lines().count(), 50);
    assert!(text.lines().last().unwrap().ends_with("record 59"));

    let (_, text) = get_text(app.clone(), "/api/cron/logs/tail?lines=2").await;
    let tail: Vec<&str> = text.lines().collect();
    assert_eq!(tail.len(), 2);
    assert!(tail[0].ends_with("record 58"));

    let (status, text) = get_text(app.clone(), "/api/cron/logs/tail?lines=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text.lines().count(), 60, "non-positive lines means whole log");
    assert!(text.lines().next().unwrap().ends_with("record 0"));

    let (_, text) = get_text(app.clone(), "/api/cron/logs/tail?lines=-3").await;
    assert_eq!(text.lines().count(), 60);

    let (status, json) = get(app, "/api/cron/logs/tail?lines=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn delete_logs_clears_then_reports_nothing_to_clear() {
    let dir = TempDir::new().unwrap();
    let logs = log_store(&dir);
    logs.append("something happened").unwrap();
    let app = build_router(test_state(&dir));

    let (status, json) = delete(app.clone(), "/api/cron/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Logs cleared successfully");
    assert_eq!(logs.read_all().unwrap(), "");

    let (_, json) = get(app.clone(), "/api/cron/logs").await;
    assert_eq!(json["line_count"], 0);

    std::fs::remove_file(logs.path()).unwrap();
    let (status, json) = delete(app, "/api/cron/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "No log file to clear");
}
