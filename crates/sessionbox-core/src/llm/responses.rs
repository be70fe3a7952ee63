//! Responses API client for the managed MCP mode.
//!
//! In this mode the model endpoint talks to the MCP tool server itself. One
//! request carries a declarative pointer to the server and the response's
//! `output` array reports what happened as typed items: tool discovery, tool
//! calls, and the final message.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AgentError;

pub const DEFAULT_RESPONSES_API_VERSION: &str = "2025-04-01-preview";
pub const DEFAULT_MCP_SERVER_LABEL: &str = "aca-python-sessions";
pub const MCP_API_KEY_HEADER: &str = "x-ms-apikey";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct McpServerTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub server_label: String,
    pub server_url: String,
    pub headers: BTreeMap<String, String>,
    pub require_approval: String,
}

impl McpServerTool {
    /// Points the model at `server_url`, authenticating with a static API key
    /// and never asking for human approval.
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(MCP_API_KEY_HEADER.to_string(), api_key.into());
        Self {
            tool_type: "mcp".to_string(),
            server_label: DEFAULT_MCP_SERVER_LABEL.to_string(),
            server_url: server_url.into(),
            headers,
            require_approval: "never".to_string(),
        }
    }

    pub fn with_server_label(mut self, label: impl Into<String>) -> Self {
        self.server_label = label.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponsesRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub tools: Vec<McpServerTool>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct McpToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    McpListTools {
        #[serde(default)]
        server_label: String,
        #[serde(default)]
        tools: Vec<McpToolDescriptor>,
        #[serde(default)]
        error: Option<Value>,
    },
    McpCall {
        #[serde(default)]
        name: String,
        #[serde(default)]
        server_label: String,
        #[serde(default)]
        arguments: String,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        error: Option<Value>,
    },
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResponsesOutput {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Renders an embedded error (a bare string or an object with `message`).
pub fn describe_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

#[async_trait]
pub trait ResponsesApi: Send + Sync {
    async fn create(&self, request: &ResponsesRequest) -> Result<ResponsesOutput, AgentError>;
}

#[derive(Debug, Clone)]
pub struct ResponsesClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    request_timeout: Option<Duration>,
}

impl ResponsesClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: DEFAULT_RESPONSES_API_VERSION.to_string(),
            request_timeout: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ResponsesApi for ResponsesClient {
    async fn create(&self, request: &ResponsesRequest) -> Result<ResponsesOutput, AgentError> {
        let url = format!("{}/openai/responses", self.endpoint);
        log::debug!("Responses API request to {} (model {})", url, request.model);

        let mut builder = self
            .client
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(request);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("HTTP request failed: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to read response: {}", e)))?;

        log::debug!("Responses API response ({}): {}", status, text);

        if !status.is_success() {
            // Tool-server failures arrive as error statuses with an `error`
            // object; those are reported in the turn instead of ending the run.
            if let Ok(output) = serde_json::from_str::<ResponsesOutput>(&text) {
                if output.error.as_ref().is_some_and(|e| !e.is_null()) {
                    log::warn!("Responses API returned {} with an error payload", status);
                    return Ok(output);
                }
            }
            return Err(AgentError::LLMError(format!(
                "API request failed with status {}: {}",
                status, text
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| AgentError::ParsingError(format!("Invalid Responses API payload: {}", e)))
    }
}
