//! Remote code execution in session-scoped sandboxes.
//!
//! A `SandboxClient` runs one piece of code inside the sandbox bound to a
//! session and reports what happened as an `ExecutionOutcome`. Calls are never
//! retried: executing code may have side effects, so a failed request surfaces
//! as an `ExecutionError` and it is up to the caller to decide what to do.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ExecutionError;
use crate::session::SessionContext;

pub mod dynamic_sessions;

pub use dynamic_sessions::{DynamicSessionsClient, SessionInfo, SessionList};

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound accepted for a configured execution timeout, in seconds.
pub const MAX_EXECUTION_TIMEOUT_SECONDS: u64 = 3600;

/// Returned instead of an empty string when a run printed nothing.
pub const NO_OUTPUT_SENTINEL: &str = "(execution finished with no output)";

const SUCCESS_STATUS: &str = "Succeeded";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub status: String,
    pub execution_time_ms: Option<u64>,
    pub stdout: String,
    pub stderr: String,
    /// Value of the last expression, if the runtime captured one.
    pub execution_result: Option<Value>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(SUCCESS_STATUS)
    }

    /// Merges stdout, the last-expression value and a labeled stderr excerpt
    /// into one block of text.
    pub fn normalized_output(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.stdout.is_empty() {
            parts.push(self.stdout.clone());
        }
        if let Some(result) = self.rendered_result() {
            parts.push(result);
        }
        if !self.stderr.is_empty() {
            parts.push(format!("[stderr]: {}", self.stderr));
        }

        if parts.is_empty() {
            return NO_OUTPUT_SENTINEL.to_string();
        }
        let merged = parts.join("\n").trim().to_string();
        if merged.is_empty() {
            NO_OUTPUT_SENTINEL.to_string()
        } else {
            merged
        }
    }

    fn rendered_result(&self) -> Option<String> {
        match self.execution_result.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait SandboxClient: Send + Sync {
    async fn execute(
        &self,
        session: &SessionContext,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}
