use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use shared::domain::EntityId;
use tokio::{net::TcpListener, sync::mpsc};

use super::*;
use crate::{application::AppMessage, push_channel::PushChannel};

const STREAM_BODY: &str = "retry: 20\n\
id: 1\nevent: task-queued\ndata: {\"id\": \"t1\", \"name\": \"Build\"}\n\n\
: keep-alive\n\
id: 2\nevent: task-start\ndata: {\"id\": \"t1\"}\n\n";

#[derive(Clone, Default)]
struct ServerState {
    stream_connections: Arc<Mutex<Vec<Option<String>>>>,
}

async fn add_sample() -> impl IntoResponse {
    "<form class='add-sample'></form>"
}

async fn hypotheses() -> impl IntoResponse {
    Json(json!({
        "1": {"id": 1, "name": "Naive Glycan Hypothesis", "hypothesis_type": "Glycan"},
        "2": {"id": 2, "name": "Informed Glycopeptide Hypothesis"}
    }))
}

async fn update_settings(Form(values): Form<HashMap<String, String>>) -> impl IntoResponse {
    let mut echoed: HashMap<String, serde_json::Value> = values
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();
    echoed.insert("minimum_score".into(), json!(0.5));
    Json(echoed)
}

async fn stream(State(state): State<ServerState>, headers: HeaderMap) -> impl IntoResponse {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state
        .stream_connections
        .lock()
        .expect("connections")
        .push(last_event_id);
    ([(header::CONTENT_TYPE, "text/event-stream")], STREAM_BODY)
}

async fn spawn_server() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/add_sample", get(add_sample))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/api/hypotheses", get(hypotheses))
        .route("/api/samples", get(|| async { Json(json!("not a map")) }))
        .route("/internal/update_settings", post(update_settings))
        .route("/stream", get(stream))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), state)
}

#[test]
fn rejects_non_http_server_urls() {
    assert!(HttpServerApi::new("ftp://example.org").is_err());
    assert!(HttpServerApi::new("not a url").is_err());
}

#[tokio::test]
async fn fetches_html_fragment() {
    let (base, _) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");

    let html = api.fetch_fragment("/add_sample").await.expect("fragment");

    assert_eq!(html, "<form class='add-sample'></form>");
}

#[tokio::test]
async fn server_errors_surface_as_fetch_failures() {
    let (base, _) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");

    let err = api.fetch_fragment("/broken").await.expect_err("should fail");

    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn parses_catalog_snapshot() {
    let (base, _) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");

    let mut records = api
        .fetch_snapshot(CatalogKind::Hypotheses)
        .await
        .expect("snapshot");
    records.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, EntityId::from("1"));
    assert_eq!(records[0].name(), Some("Naive Glycan Hypothesis"));
}

#[tokio::test]
async fn malformed_snapshot_is_an_error() {
    let (base, _) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");

    assert!(api.fetch_snapshot(CatalogKind::Samples).await.is_err());
}

#[tokio::test]
async fn settings_sync_returns_server_view() {
    let (base, _) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");
    let mut settings = SettingsMap::new();
    settings.insert("theme".into(), "dark".into());

    let synced = api.update_settings(&settings).await.expect("sync");

    assert_eq!(synced.get("theme").map(String::as_str), Some("dark"));
    assert_eq!(synced.get("minimum_score").map(String::as_str), Some("0.5"));
}

#[tokio::test]
async fn push_channel_delivers_in_order_and_resumes_with_last_id() {
    let (base, state) = spawn_server().await;
    let api = HttpServerApi::new(&base).expect("api");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = PushChannel::new(api.http_client(), api.endpoint("/stream").expect("url"))
        .with_reconnect_delay(Duration::from_millis(20))
        .spawn(tx);

    let mut received = Vec::new();
    while received.len() < 4 {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timely message")
            .expect("channel open");
        let AppMessage::Push(message) = message else {
            panic!("unexpected inbox message");
        };
        received.push((message.event, message.id));
    }
    drop(rx);
    handle.abort();

    assert_eq!(
        received,
        vec![
            ("task-queued".to_string(), Some("1".to_string())),
            ("task-start".to_string(), Some("2".to_string())),
            ("task-queued".to_string(), Some("1".to_string())),
            ("task-start".to_string(), Some("2".to_string())),
        ]
    );
    let connections = state.stream_connections.lock().expect("connections").clone();
    assert_eq!(connections[0], None);
    assert_eq!(connections[1].as_deref(), Some("2"));
}

#[tokio::test]
async fn missing_server_refuses_everything() {
    let missing = MissingServer;
    assert!(missing.fetch_fragment("/add_sample").await.is_err());
    assert!(missing.fetch_snapshot(CatalogKind::Samples).await.is_err());
    assert!(missing.update_settings(&SettingsMap::new()).await.is_err());
}
