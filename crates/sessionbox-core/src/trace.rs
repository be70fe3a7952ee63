// src/trace.rs

use serde::{Deserialize, Serialize};

use crate::core_types::{ToolCall, ToolResult};
use crate::errors::AgentError;
use crate::managed::ManagedEvent;
use crate::tools::ToolInvocation;

/// What happened in one model round of a function-calling turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub round: usize,
    pub thought: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
}

/// Receives progress notifications from the orchestrators and the driver.
/// Every method defaults to a no-op.
pub trait ConversationObserver: Send + Sync {
    fn on_turn_started(&self, _user_message: &str) {}

    fn on_tool_request(&self, _call: &ToolCall, _invocation: Option<&ToolInvocation>) {}

    fn on_tool_result(&self, _call: &ToolCall, _result: &ToolResult) {}

    fn on_round_complete(&self, _record: &RoundRecord) {}

    fn on_managed_event(&self, _event: &ManagedEvent) {}

    fn on_final_answer(&self, _answer: &str) {}

    fn on_turn_failed(&self, _error: &AgentError) {}

    fn on_awaiting_input(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConversationObserver for NoopObserver {}
