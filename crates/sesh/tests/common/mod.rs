//! Test utilities: a mock backend serving the control API and the realtime
//! channel on an ephemeral port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use sesh::ClientConfig;

/// Runtime credential every mock session hands out.
pub const CREDENTIAL: &str = "mock-credential";

/// Install the test log subscriber once; `RUST_LOG` controls verbosity.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Session id the mock allocates on create.
pub const SESSION_ID: &str = "sess-mock-1";

/// Shared state behind the mock routes.
pub struct MockState {
    base_url: String,
    v2_enabled: bool,
    /// Polls that must happen before the v2 scheme reports ready.
    ready_after_polls: u32,
    /// Fixed v2 execution status; overrides the poll counter when set.
    v2_status_override: Option<String>,
    /// When set, the v2 detail route fails with this status code.
    v2_fail_status: Option<u16>,
    /// Runtime endpoint reported once ready; defaults to the mock itself.
    endpoint_override: Option<String>,
    status_polls: AtomicU32,
    start_calls: AtomicU32,
    resume_calls: AtomicU32,
    stop_calls: AtomicU32,
    legacy_status: Mutex<String>,
    /// Events pushed over the realtime channel when a message arrives.
    turn_events: Vec<Value>,
    /// When set, the realtime channel accepts actions but never replies.
    silent_realtime: bool,
    /// Events served by the history endpoint.
    history: Vec<Value>,
    /// Every action received over the realtime channel, in order.
    ws_actions: Mutex<Vec<Value>>,
}

impl MockState {
    pub fn v2_polls(&self) -> u32 {
        self.status_polls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> u32 {
        self.resume_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn ws_actions(&self) -> Vec<Value> {
        self.ws_actions.lock().unwrap().clone()
    }
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub struct MockBackendBuilder {
    v2_enabled: bool,
    ready_after_polls: u32,
    v2_status_override: Option<String>,
    v2_fail_status: Option<u16>,
    endpoint_override: Option<String>,
    legacy_status: String,
    turn_events: Vec<Value>,
    silent_realtime: bool,
    history: Vec<Value>,
}

impl Default for MockBackendBuilder {
    fn default() -> Self {
        Self {
            v2_enabled: true,
            ready_after_polls: 0,
            v2_status_override: None,
            v2_fail_status: None,
            endpoint_override: None,
            legacy_status: "running".to_string(),
            turn_events: vec![],
            silent_realtime: false,
            history: vec![],
        }
    }
}

impl MockBackendBuilder {
    /// Disable the v2 scheme; its routes answer 404.
    pub fn without_v2(mut self) -> Self {
        self.v2_enabled = false;
        self
    }

    /// Report not-ready for the first `n` status polls.
    pub fn ready_after_polls(mut self, n: u32) -> Self {
        self.ready_after_polls = n;
        self
    }

    /// Pin the v2 execution status, ignoring the poll counter.
    pub fn v2_status(mut self, status: &str) -> Self {
        self.v2_status_override = Some(status.to_string());
        self
    }

    /// Make the v2 detail route fail with this status code.
    pub fn v2_error(mut self, status: u16) -> Self {
        self.v2_fail_status = Some(status);
        self
    }

    /// Report this runtime endpoint instead of the mock's own address.
    pub fn runtime_endpoint(mut self, url: &str) -> Self {
        self.endpoint_override = Some(url.to_string());
        self
    }

    /// Initial status under the legacy scheme.
    pub fn legacy_status(mut self, status: &str) -> Self {
        self.legacy_status = status.to_string();
        self
    }

    /// Events pushed over the realtime channel after a message arrives.
    pub fn turn_events(mut self, events: Vec<Value>) -> Self {
        self.turn_events = events;
        self
    }

    /// Accept realtime actions but never push anything back.
    pub fn silent_realtime(mut self) -> Self {
        self.silent_realtime = true;
        self
    }

    /// Events served by the history endpoint.
    pub fn history(mut self, events: Vec<Value>) -> Self {
        self.history = events;
        self
    }

    pub async fn spawn(self) -> MockBackend {
        init_tracing();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");

        let state = Arc::new(MockState {
            base_url: format!("http://{}", addr),
            v2_enabled: self.v2_enabled,
            ready_after_polls: self.ready_after_polls,
            v2_status_override: self.v2_status_override,
            v2_fail_status: self.v2_fail_status,
            endpoint_override: self.endpoint_override,
            status_polls: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
            resume_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            legacy_status: Mutex::new(self.legacy_status),
            turn_events: self.turn_events,
            silent_realtime: self.silent_realtime,
            history: self.history,
            ws_actions: Mutex::new(vec![]),
        });

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend serve");
        });

        MockBackend { addr, state }
    }
}

/// Config tuned for tests: tight timers against a local mock.
pub fn test_config(server_url: &str) -> ClientConfig {
    ClientConfig {
        server_url: server_url.to_string(),
        connect_timeout_secs: 5,
        poll_interval_ms: 10,
        readiness_budget_secs: 5,
        run_trigger_delay_ms: 10,
        turn_content_timeout_secs: 1,
        cache_ttl_secs: 300,
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session).get(list_sessions))
        .route(
            "/api/sessions/{id}",
            get(get_session_legacy).delete(delete_session),
        )
        .route("/api/sessions/{id}/start", post(start_session))
        .route("/api/sessions/{id}/resume", post(resume_session))
        .route("/api/sessions/{id}/stop", post(stop_session))
        .route("/api/sessions/{id}/events", get(get_events))
        .route("/api/v2/sessions/{id}", get(get_session_v2))
        .route("/ws/sessions/{id}", get(realtime))
        .with_state(state)
}

async fn create_session() -> Json<Value> {
    Json(json!({
        "id": SESSION_ID,
        "created_at": "2026-08-30T12:00:00Z",
        "status": "created"
    }))
}

async fn list_sessions(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(json!({
        "sessions": [{"id": SESSION_ID, "status": state.legacy_status.lock().unwrap().clone()}],
        "has_more": false
    }))
}

async fn start_session(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.start_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"status": "starting"}))
}

async fn get_session_v2(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    if !state.v2_enabled || id != SESSION_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknown session"})),
        )
            .into_response();
    }

    if let Some(code) = state.v2_fail_status {
        return (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({"error": "backend unavailable"})),
        )
            .into_response();
    }

    let endpoint = state
        .endpoint_override
        .clone()
        .unwrap_or_else(|| state.base_url.clone());

    if let Some(status) = &state.v2_status_override {
        return Json(json!({
            "id": id,
            "execution_status": status,
            "sandbox_status": "running",
            "runtime_endpoint": endpoint,
            "session_api_key": CREDENTIAL
        }))
        .into_response();
    }

    let polls = state.status_polls.fetch_add(1, Ordering::SeqCst) + 1;
    if polls <= state.ready_after_polls {
        Json(json!({
            "id": id,
            "execution_status": "starting",
            "sandbox_status": "running"
        }))
        .into_response()
    } else {
        Json(json!({
            "id": id,
            "execution_status": "running",
            "sandbox_status": "running",
            "runtime_endpoint": endpoint,
            "session_api_key": CREDENTIAL
        }))
        .into_response()
    }
}

async fn get_session_legacy(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    if id != SESSION_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknown session"})),
        )
            .into_response();
    }
    let status = state.legacy_status.lock().unwrap().clone();
    if status == "running" {
        Json(json!({
            "id": id,
            "status": status,
            "runtime_url": state.base_url,
            "session_api_key": CREDENTIAL
        }))
        .into_response()
    } else {
        Json(json!({"id": id, "status": status})).into_response()
    }
}

async fn resume_session(State(state): State<Arc<MockState>>) -> StatusCode {
    state.resume_calls.fetch_add(1, Ordering::SeqCst);
    *state.legacy_status.lock().unwrap() = "running".to_string();
    StatusCode::OK
}

async fn stop_session(State(state): State<Arc<MockState>>) -> StatusCode {
    state.stop_calls.fetch_add(1, Ordering::SeqCst);
    *state.legacy_status.lock().unwrap() = "stopped".to_string();
    StatusCode::OK
}

async fn delete_session(Path(id): Path<String>) -> StatusCode {
    if id == SESSION_ID {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_events(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(json!({"events": state.history, "has_more": false}))
}

async fn realtime(
    State(state): State<Arc<MockState>>,
    Path(_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.get("credential").map(String::as_str) != Some(CREDENTIAL) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, state))
        .into_response()
}

async fn serve_socket(mut socket: WebSocket, state: Arc<MockState>) {
    while let Some(Ok(frame)) = socket.recv().await {
        match frame {
            Message::Text(text) => {
                let action: Value = match serde_json::from_str(text.as_str()) {
                    Ok(value) => value,
                    Err(_) => continue,
                };
                let is_message = action.get("action").and_then(Value::as_str) == Some("message");
                state.ws_actions.lock().unwrap().push(action);

                if is_message && !state.silent_realtime {
                    for event in &state.turn_events {
                        if socket
                            .send(Message::Text(event.to_string().into()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}
