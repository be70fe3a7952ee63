//! Language model integrations.
//!
//! Defines the `LLM` trait used by the function-calling orchestrator and the
//! chat-completion client that implements it for Azure OpenAI and plain
//! OpenAI-compatible endpoints. The Responses API client used by the managed
//! MCP mode lives in `responses`.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod chat_completions;
pub mod responses;

pub use chat_completions::OpenAIClient;
pub use responses::{McpServerTool, OutputItem, ResponsesApi, ResponsesClient};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError>;
}
