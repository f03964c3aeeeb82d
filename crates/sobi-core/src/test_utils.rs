//! Test utilities for sobi-core
//!
//! A mock completion server speaking both the OpenAI chat completions API
//! and Ollama's `/api/chat`, for backend and integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

type ReplyFn = Arc<dyn Fn(&Value) -> (StatusCode, String) + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    reply: ReplyFn,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// Mock LLM server for testing
pub struct MockCompletionServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockCompletionServer {
    /// Start a server that answers every completion with `reply`
    pub async fn start(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::start_with(move |_| (StatusCode::OK, reply.clone())).await
    }

    /// Start a server that fails every completion with `status`
    pub async fn start_with_status(status: StatusCode) -> Self {
        Self::start_with(move |_| (status, "mock failure".to_string())).await
    }

    /// Start a server whose replies are computed from the request body
    pub async fn start_with<F>(reply: F) -> Self
    where
        F: Fn(&Value) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            reply: Arc::new(reply),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_openai_chat))
            .route("/api/tags", get(handle_tags))
            .route("/api/chat", post(handle_ollama_chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            requests,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockCompletionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record(state: &ServerState, body: Value) -> (StatusCode, String) {
    let out = (state.reply)(&body);
    state.requests.lock().unwrap().push(body);
    out
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "mock-model", "object": "model"}]}))
}

async fn handle_tags() -> Json<Value> {
    Json(json!({"models": [{"name": "mock-model:latest"}]}))
}

async fn handle_openai_chat(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let model = body["model"].clone();
    match record(&state, body) {
        (status, content) if status.is_success() => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        (status, message) => (status, message).into_response(),
    }
}

async fn handle_ollama_chat(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let model = body["model"].clone();
    match record(&state, body) {
        (status, content) if status.is_success() => Json(json!({
            "model": model,
            "message": {"role": "assistant", "content": content},
            "done": true
        }))
        .into_response(),
        (status, message) => (status, message).into_response(),
    }
}
