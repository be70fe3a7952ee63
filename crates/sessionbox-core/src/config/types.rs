//! Configuration type definitions
//!
//! `FileConfig` mirrors the optional YAML file: every field may be omitted.
//! `AppConfig` is the resolved result the binary builds its clients from.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::orchestrator::OrchestratorConfig;

pub const DEFAULT_MODEL_DEPLOYMENT: &str = "gpt-4o";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 120;

/// Which endpoints a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Function calling against the sandbox pool.
    Function,
    /// Managed MCP mode through the Responses API.
    Mcp,
    /// Direct sandbox commands (`exec`, `sessions`).
    SandboxOnly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub model: ModelSection,
    pub sandbox: SandboxSection,
    pub mcp: McpSection,
    pub orchestrator: OrchestratorSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSection {
    pub pool_endpoint: Option<String>,
    pub access_token: Option<String>,
    pub api_version: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub session_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct McpSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub server_label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorSection {
    pub max_rounds: Option<usize>,
    pub system_prompt: Option<String>,
    pub mcp_instructions: Option<String>,
}

#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: Option<String>,
    pub request_timeout: Duration,
    pub temperature: Option<f32>,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct SandboxConfig {
    pub pool_endpoint: String,
    /// Static bearer token; the Azure CLI is used when absent.
    pub access_token: Option<String>,
    pub api_version: Option<String>,
    pub execution_timeout: Duration,
    pub session_prefix: String,
}

impl fmt::Debug for SandboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxConfig")
            .field("pool_endpoint", &self.pool_endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("execution_timeout", &self.execution_timeout)
            .field("session_prefix", &self.session_prefix)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct McpConfig {
    pub endpoint: String,
    pub api_key: String,
    pub server_label: String,
}

impl fmt::Debug for McpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("server_label", &self.server_label)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub model: Option<ModelConfig>,
    pub sandbox: Option<SandboxConfig>,
    pub mcp: Option<McpConfig>,
    pub orchestrator: OrchestratorConfig,
    pub mcp_instructions: String,
}

impl AppConfig {
    pub fn model(&self) -> Result<&ModelConfig, AgentError> {
        self.model.as_ref().ok_or_else(|| not_resolved("model", self.mode))
    }

    pub fn sandbox(&self) -> Result<&SandboxConfig, AgentError> {
        self.sandbox.as_ref().ok_or_else(|| not_resolved("sandbox", self.mode))
    }

    pub fn mcp(&self) -> Result<&McpConfig, AgentError> {
        self.mcp.as_ref().ok_or_else(|| not_resolved("mcp", self.mode))
    }
}

fn not_resolved(section: &str, mode: RunMode) -> AgentError {
    AgentError::ConfigError(format!(
        "{} settings are not resolved in {:?} mode",
        section, mode
    ))
}
