//! Error types for the orchestration loop and the sandbox transport
//!
//! Errors are split by where they are recovered. `ExecutionError` covers every
//! way a single sandbox call can fail and is normally folded back into the
//! conversation as a tool result. `AgentError` covers the failures that end a
//! turn or the whole run: configuration problems, model transport failures and
//! an exhausted round budget.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Malformed request for tool '{tool_name}': {message}")]
    MalformedToolRequest { tool_name: String, message: String },
    #[error("Tool-calling budget exceeded: the model still requested tools after {max_rounds} rounds")]
    BudgetExceeded { max_rounds: usize },
    #[error("Sandbox execution failed: {0}")]
    Sandbox(#[from] ExecutionError),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl AgentError {
    /// Whether the error leaves the conversation without anything to continue
    /// from. Model-side failures are fatal to the run; everything else only
    /// ends the current turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::ConfigError(_) | AgentError::LLMError(_) | AgentError::ParsingError(_)
        )
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::LLMError(err.to_string())
    }
}

// Specific error for the sandbox client
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("request to sandbox endpoint failed: {0}")]
    Transport(String),
    #[error("sandbox endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("sandbox response could not be decoded: {0}")]
    MalformedResponse(String),
    #[error("could not obtain sandbox credentials: {0}")]
    Credential(String),
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        ExecutionError::Transport(err.to_string())
    }
}
