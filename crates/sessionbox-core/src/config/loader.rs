//! Configuration loader for YAML files and environment resolution

use std::path::Path;
use std::time::Duration;

use tokio::fs;

use crate::config::types::*;
use crate::errors::AgentError;
use crate::llm::responses::DEFAULT_MCP_SERVER_LABEL;
use crate::managed::DEFAULT_MCP_INSTRUCTIONS;
use crate::orchestrator::{OrchestratorConfig, DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT};
use crate::sandbox::{DEFAULT_EXECUTION_TIMEOUT, MAX_EXECUTION_TIMEOUT_SECONDS};
use crate::session::DEFAULT_SESSION_PREFIX;

pub const POOL_ENDPOINT: &str = "POOL_ENDPOINT";
pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_MODEL: &str = "AZURE_OPENAI_MODEL";
pub const AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const MCP_ENDPOINT: &str = "MCP_ENDPOINT";
pub const MCP_API_KEY: &str = "MCP_API_KEY";
pub const SANDBOX_ACCESS_TOKEN: &str = "SANDBOX_ACCESS_TOKEN";
pub const SANDBOX_TIMEOUT_SECONDS: &str = "SANDBOX_TIMEOUT_SECONDS";
pub const SESSIONS_API_VERSION: &str = "SESSIONS_API_VERSION";
pub const MAX_TOOL_ROUNDS: &str = "MAX_TOOL_ROUNDS";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the optional YAML file.
    pub async fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, AgentError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse_file(&content).map_err(|e| match e {
            AgentError::ConfigError(msg) => {
                AgentError::ConfigError(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    pub fn parse_file(content: &str) -> Result<FileConfig, AgentError> {
        if content.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse YAML: {}", e)))
    }

    /// Resolve against the process environment.
    pub fn from_env(mode: RunMode, file: FileConfig) -> Result<AppConfig, AgentError> {
        Self::resolve(mode, file, |key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment values. Required values are
    /// checked in a fixed order per mode and the first missing one is reported.
    pub fn resolve<F>(mode: RunMode, file: FileConfig, lookup: F) -> Result<AppConfig, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let pick = |key: &str, fallback: &Option<String>| {
            env(key).or_else(|| fallback.clone().filter(|v| !v.trim().is_empty()))
        };

        let pool_endpoint = pick(POOL_ENDPOINT, &file.sandbox.pool_endpoint);
        let model_endpoint = pick(AZURE_OPENAI_ENDPOINT, &file.model.endpoint);
        let model_key = pick(AZURE_OPENAI_API_KEY, &file.model.api_key);
        let mcp_endpoint = pick(MCP_ENDPOINT, &file.mcp.endpoint);
        let mcp_key = pick(MCP_API_KEY, &file.mcp.api_key);

        let required: Vec<(&str, &Option<String>)> = match mode {
            RunMode::Function => vec![
                (POOL_ENDPOINT, &pool_endpoint),
                (AZURE_OPENAI_ENDPOINT, &model_endpoint),
                (AZURE_OPENAI_API_KEY, &model_key),
            ],
            RunMode::Mcp => vec![
                (MCP_ENDPOINT, &mcp_endpoint),
                (MCP_API_KEY, &mcp_key),
                (AZURE_OPENAI_ENDPOINT, &model_endpoint),
                (AZURE_OPENAI_API_KEY, &model_key),
            ],
            RunMode::SandboxOnly => vec![(POOL_ENDPOINT, &pool_endpoint)],
        };
        for (name, value) in required {
            if value.is_none() {
                return Err(AgentError::ConfigError(format!(
                    "{} is not set. Check your .env file.",
                    name
                )));
            }
        }

        let execution_timeout = match env(SANDBOX_TIMEOUT_SECONDS) {
            Some(raw) => execution_timeout(
                SANDBOX_TIMEOUT_SECONDS,
                parse_positive(SANDBOX_TIMEOUT_SECONDS, &raw)?,
            )?,
            None => match file.sandbox.timeout_seconds {
                Some(secs) => execution_timeout("sandbox.timeout_seconds", secs)?,
                None => DEFAULT_EXECUTION_TIMEOUT,
            },
        };

        let max_rounds = match env(MAX_TOOL_ROUNDS) {
            Some(raw) => parse_positive(MAX_TOOL_ROUNDS, &raw)? as usize,
            None => match file.orchestrator.max_rounds {
                Some(0) => return Err(zero_value("orchestrator.max_rounds")),
                Some(rounds) => rounds,
                None => DEFAULT_MAX_ROUNDS,
            },
        };

        let request_timeout = match file.model.request_timeout_seconds {
            Some(0) => return Err(zero_value("model.request_timeout_seconds")),
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        };

        let model = match (mode, model_endpoint, model_key) {
            (RunMode::SandboxOnly, _, _) => None,
            (_, Some(endpoint), Some(api_key)) => Some(ModelConfig {
                endpoint: trim_endpoint(&endpoint),
                api_key,
                deployment: pick(AZURE_OPENAI_MODEL, &file.model.deployment)
                    .unwrap_or_else(|| DEFAULT_MODEL_DEPLOYMENT.to_string()),
                api_version: pick(AZURE_OPENAI_API_VERSION, &file.model.api_version),
                request_timeout,
                temperature: file.model.temperature,
            }),
            _ => None,
        };

        let sandbox = match (mode, pool_endpoint) {
            (RunMode::Mcp, _) | (_, None) => None,
            (_, Some(endpoint)) => Some(SandboxConfig {
                pool_endpoint: trim_endpoint(&endpoint),
                access_token: pick(SANDBOX_ACCESS_TOKEN, &file.sandbox.access_token),
                api_version: pick(SESSIONS_API_VERSION, &file.sandbox.api_version),
                execution_timeout,
                session_prefix: file
                    .sandbox
                    .session_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SESSION_PREFIX.to_string()),
            }),
        };

        let mcp = match (mode, mcp_endpoint, mcp_key) {
            (RunMode::Mcp, Some(endpoint), Some(api_key)) => Some(McpConfig {
                endpoint: trim_endpoint(&endpoint),
                api_key,
                server_label: file
                    .mcp
                    .server_label
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MCP_SERVER_LABEL.to_string()),
            }),
            _ => None,
        };

        let config = AppConfig {
            mode,
            model,
            sandbox,
            mcp,
            orchestrator: OrchestratorConfig {
                max_rounds,
                system_prompt: file
                    .orchestrator
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
                execution_timeout,
            },
            mcp_instructions: file
                .orchestrator
                .mcp_instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_MCP_INSTRUCTIONS.to_string()),
        };
        log::debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, AgentError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(zero_value(name)),
        Ok(value) => Ok(value),
        Err(_) => Err(AgentError::ConfigError(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

/// Validates an execution timeout given in seconds. `name` is the setting
/// reported in the error.
pub fn execution_timeout(name: &str, secs: u64) -> Result<Duration, AgentError> {
    match secs {
        0 => Err(zero_value(name)),
        secs if secs > MAX_EXECUTION_TIMEOUT_SECONDS => Err(AgentError::ConfigError(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_EXECUTION_TIMEOUT_SECONDS, secs
        ))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn zero_value(name: &str) -> AgentError {
    AgentError::ConfigError(format!("{} must be at least 1", name))
}
