use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ExecutionOutcome, SandboxClient};
use crate::errors::ExecutionError;
use crate::session::SessionContext;

pub const DEFAULT_SESSIONS_API_VERSION: &str = "2025-10-02-preview";

/// Extra time the HTTP request is allowed on top of the remote execution
/// timeout, so the pool gets to report its own timeout first.
const TRANSPORT_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionRequest<'a> {
    code_input_type: &'static str,
    execution_type: &'static str,
    code: &'a str,
    timeout_in_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<ExecutionResultBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResultBody {
    #[serde(default)]
    execution_time_in_milliseconds: Option<u64>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    execution_result: Option<Value>,
}

impl From<ExecutionResponse> for ExecutionOutcome {
    fn from(response: ExecutionResponse) -> Self {
        let result = response.result.unwrap_or_default();
        ExecutionOutcome {
            status: response.status.unwrap_or_else(|| "Unknown".to_string()),
            execution_time_ms: result.execution_time_in_milliseconds,
            stdout: result.stdout.unwrap_or_default(),
            stderr: result.stderr.unwrap_or_default(),
            execution_result: result.execution_result,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionList {
    #[serde(default, alias = "value")]
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// Client for a dynamic-sessions pool endpoint.
#[derive(Debug, Clone)]
pub struct DynamicSessionsClient {
    client: Client,
    pool_endpoint: String,
    api_version: String,
}

impl DynamicSessionsClient {
    pub fn new(pool_endpoint: impl Into<String>) -> Self {
        let pool_endpoint: String = pool_endpoint.into();
        Self {
            client: Client::new(),
            pool_endpoint: pool_endpoint.trim_end_matches('/').to_string(),
            api_version: DEFAULT_SESSIONS_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn pool_endpoint(&self) -> &str {
        &self.pool_endpoint
    }

    /// Lists the sessions currently alive in the pool.
    pub async fn list_sessions(
        &self,
        session: &SessionContext,
    ) -> Result<SessionList, ExecutionError> {
        let url = format!("{}/listSessions", self.pool_endpoint);
        let token = session.credential().access_token().await?;

        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(&token.token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let text = Self::read_success_body(response).await?;
        serde_json::from_str(&text)
            .map_err(|e| ExecutionError::MalformedResponse(format!("invalid session list: {}", e)))
    }

    async fn read_success_body(response: reqwest::Response) -> Result<String, ExecutionError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            log::error!("Sandbox endpoint returned {}: {}", status, text);
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl SandboxClient for DynamicSessionsClient {
    async fn execute(
        &self,
        session: &SessionContext,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let url = format!("{}/executions", self.pool_endpoint);
        let payload = ExecutionRequest {
            code_input_type: "inline",
            execution_type: "synchronous",
            code,
            timeout_in_seconds: timeout.as_secs().max(1),
        };
        let token = session.credential().access_token().await?;

        log::info!(
            "Executing {} bytes of code in session {}",
            code.len(),
            session.id()
        );
        log::debug!("POST {} (identifier={})", url, session.id());

        let response = self
            .client
            .post(&url)
            .query(&[
                ("identifier", session.id().as_str()),
                ("api-version", self.api_version.as_str()),
            ])
            .bearer_auth(&token.token)
            .header("Content-Type", "application/json")
            .timeout(timeout.saturating_add(TRANSPORT_GRACE))
            .json(&payload)
            .send()
            .await?;

        let text = Self::read_success_body(response).await?;
        let parsed: ExecutionResponse = serde_json::from_str(&text).map_err(|e| {
            ExecutionError::MalformedResponse(format!("invalid execution response: {}", e))
        })?;
        let outcome = ExecutionOutcome::from(parsed);

        log::info!(
            "Execution finished in session {} (status: {}, time: {}ms)",
            session.id(),
            outcome.status,
            outcome
                .execution_time_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "N/A".to_string())
        );
        Ok(outcome)
    }
}
