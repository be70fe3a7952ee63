// src/test_utils/mock_sessions_server.rs
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    body: String,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, message: &str) -> Self {
        Self {
            status,
            body: message.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn into_parts(self) -> (u16, String) {
        (self.status, self.body)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedExecution {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockServerState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedExecution>>>,
    sessions: Arc<Value>,
}

fn into_response(mock: MockResponse) -> Response {
    let (status, body) = mock.into_parts();
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn executions_handler(
    State(state): State<MockServerState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    log::debug!("Mock sessions server received execution: {:?} {}", query, body);
    state.requests.lock().unwrap().push(RecordedExecution {
        query,
        authorization,
        body,
    });

    match state.responses.lock().unwrap().pop_front() {
        Some(mock) => into_response(mock),
        None => {
            log::error!("Mock sessions server ran out of responses!");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn list_sessions_handler(State(state): State<MockServerState>) -> Response {
    into_response(MockResponse::ok(state.sessions.as_ref().clone()))
}

pub struct MockSessionsServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    recorded_requests: Arc<Mutex<Vec<RecordedExecution>>>,
}

impl MockSessionsServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        Self::spawn(responses, serde_json::json!({ "sessions": [] })).await
    }

    pub async fn start_with_sessions(sessions: Value) -> Self {
        Self::spawn(Vec::new(), sessions).await
    }

    async fn spawn(responses: Vec<MockResponse>, sessions: Value) -> Self {
        let state = MockServerState {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(sessions),
        };
        let recorded_requests = state.requests.clone();

        let app = Router::new()
            .route("/executions", post(executions_handler))
            .route("/listSessions", get(list_sessions_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("Failed to bind mock sessions server: {}", e));
        let addr = listener.local_addr().unwrap();
        log::info!("Mock sessions server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock sessions server error: {}", e));
        });

        Self {
            addr,
            shutdown_tx,
            recorded_requests,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get_requests(&self) -> Vec<RecordedExecution> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock sessions server already stopped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}
