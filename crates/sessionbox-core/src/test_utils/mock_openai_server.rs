// src/test_utils/mock_openai_server.rs
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use super::mock_sessions_server::MockResponse;

#[derive(Debug, Clone)]
pub struct RecordedModelRequest {
    /// Deployment segment of the chat-completions path, `None` for responses.
    pub deployment: Option<String>,
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockServerState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedModelRequest>>>,
}

impl MockServerState {
    fn record_and_reply(
        &self,
        deployment: Option<String>,
        query: HashMap<String, String>,
        headers: &HeaderMap,
        body: String,
    ) -> Response {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let body = serde_json::from_str(&body).unwrap_or(Value::Null);
        log::debug!("Mock OpenAI server received request: {}", body);
        self.requests.lock().unwrap().push(RecordedModelRequest {
            deployment,
            query,
            api_key: header_value("api-key"),
            authorization: header_value("authorization"),
            body,
        });

        match self.responses.lock().unwrap().pop_front() {
            Some(mock) => mock.into_axum_response(),
            None => {
                log::error!("Mock OpenAI server ran out of responses!");
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
        }
    }
}

impl MockResponse {
    fn into_axum_response(self) -> Response {
        let (status, body) = self.into_parts();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

async fn deployment_chat_handler(
    State(state): State<MockServerState>,
    Path(deployment): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record_and_reply(Some(deployment), query, &headers, body)
}

async fn plain_chat_handler(
    State(state): State<MockServerState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record_and_reply(None, query, &headers, body)
}

async fn responses_handler(
    State(state): State<MockServerState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record_and_reply(None, query, &headers, body)
}

pub struct MockOpenAIServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    recorded_requests: Arc<Mutex<Vec<RecordedModelRequest>>>,
}

impl MockOpenAIServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let state = MockServerState {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded_requests = state.requests.clone();

        let app = Router::new()
            .route(
                "/openai/deployments/{deployment}/chat/completions",
                post(deployment_chat_handler),
            )
            .route("/v1/chat/completions", post(plain_chat_handler))
            .route("/openai/responses", post(responses_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("Failed to bind mock OpenAI server: {}", e));
        let addr = listener.local_addr().unwrap();
        log::info!("Mock OpenAI server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock OpenAI server error: {}", e));
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

    pub fn get_requests(&self) -> Vec<RecordedModelRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock OpenAI server already stopped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}
