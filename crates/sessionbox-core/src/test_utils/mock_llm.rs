// src/test_utils/mock_llm.rs
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::core_types::{LLMResponse, Message, ToolCall};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};

/// Replays scripted responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedLLM {
    responses: Mutex<VecDeque<Result<LLMResponse, AgentError>>>,
    repeat_last: Option<LLMResponse>,
    requests: Mutex<Vec<(Vec<Message>, Option<Vec<ToolMetadata>>)>>,
}

impl ScriptedLLM {
    pub fn new(responses: Vec<Result<LLMResponse, AgentError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            ..Default::default()
        }
    }

    /// Returns `response` forever once the scripted ones run out.
    pub fn repeating(response: LLMResponse) -> Self {
        Self {
            repeat_last: Some(response),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<(Vec<Message>, Option<Vec<ToolMetadata>>)> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn text(content: &str) -> LLMResponse {
    LLMResponse {
        content: Some(content.to_string()),
        tool_calls: None,
        finish_reason: Some("stop".to_string()),
        usage: None,
    }
}

pub fn tool_calls(calls: &[(&str, &str)]) -> LLMResponse {
    LLMResponse {
        content: None,
        tool_calls: Some(
            calls
                .iter()
                .map(|(id, arguments)| ToolCall {
                    id: id.to_string(),
                    name: crate::tools::EXECUTE_PYTHON_CODE.to_string(),
                    arguments: arguments.to_string(),
                })
                .collect(),
        ),
        finish_reason: Some("tool_calls".to_string()),
        usage: None,
    }
}

pub fn code_call(id: &str, code: &str) -> (String, String) {
    (
        id.to_string(),
        serde_json::json!({ "code": code }).to_string(),
    )
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        self.requests.lock().unwrap().push((messages, tools));
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat_last {
            Some(response) => Ok(response.clone()),
            None => Err(AgentError::LLMError("scripted LLM ran out of responses".to_string())),
        }
    }
}
