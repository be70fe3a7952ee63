//! Managed MCP mode.
//!
//! The model endpoint drives the tool server itself: a single Responses API
//! request names the MCP server, and the reply lists what the model did with
//! it. `ManagedOrchestrator` turns that output into `ManagedEvent`s for the
//! observer and extracts the final answer text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AgentError;
use crate::llm::responses::{
    describe_error, ContentPart, McpServerTool, OutputItem, ResponsesApi, ResponsesOutput,
    ResponsesRequest,
};
use crate::orchestrator::ConversationAgent;
use crate::trace::{ConversationObserver, NoopObserver};

pub const ARGUMENT_PREVIEW_CHARS: usize = 200;

pub const DEFAULT_MCP_INSTRUCTIONS: &str = "You are a helpful assistant. When code needs to run, \
first start an environment with launchPythonEnvironment, then run the code with \
runPythonCodeInRemoteEnvironment. Always print() the results you want to see.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagedEvent {
    ToolsDiscovered {
        server_label: String,
        tool_names: Vec<String>,
        error: Option<String>,
    },
    ToolCalled {
        name: String,
        server_label: String,
        argument_preview: String,
        output: Option<String>,
        error: Option<String>,
    },
    Message {
        text: String,
    },
    /// Top-level failure reported inside an otherwise delivered response.
    Error {
        message: String,
    },
}

/// Cuts `arguments` to `ARGUMENT_PREVIEW_CHARS` characters, marking the cut.
pub fn preview_arguments(arguments: &str) -> String {
    if arguments.chars().count() > ARGUMENT_PREVIEW_CHARS {
        let head: String = arguments.chars().take(ARGUMENT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        arguments.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedTurn {
    pub answer: String,
    pub events: Vec<ManagedEvent>,
}

impl ManagedTurn {
    pub fn from_output(output: ResponsesOutput) -> Self {
        let mut events = Vec::new();
        let mut answer_parts = Vec::new();

        for item in output.output {
            match item {
                OutputItem::McpListTools {
                    server_label,
                    tools,
                    error,
                } => events.push(ManagedEvent::ToolsDiscovered {
                    server_label,
                    tool_names: tools.into_iter().map(|t| t.name).collect(),
                    error: error.as_ref().map(describe_error),
                }),
                OutputItem::McpCall {
                    name,
                    server_label,
                    arguments,
                    output,
                    error,
                } => events.push(ManagedEvent::ToolCalled {
                    name,
                    server_label,
                    argument_preview: preview_arguments(&arguments),
                    output,
                    error: error.as_ref().map(describe_error),
                }),
                OutputItem::Message { content } => {
                    let text: String = content
                        .into_iter()
                        .filter_map(|part| match part {
                            ContentPart::OutputText { text } => Some(text),
                            ContentPart::Other => None,
                        })
                        .collect();
                    answer_parts.push(text.clone());
                    events.push(ManagedEvent::Message { text });
                }
                OutputItem::Other => log::debug!("Ignoring unrecognized output item"),
            }
        }

        if let Some(error) = output.error.as_ref().filter(|e| !e.is_null()) {
            events.push(ManagedEvent::Error {
                message: describe_error(error),
            });
        }

        Self {
            answer: answer_parts.concat(),
            events,
        }
    }
}

pub struct ManagedOrchestrator {
    api: Arc<dyn ResponsesApi>,
    model: String,
    instructions: String,
    server: McpServerTool,
    observer: Arc<dyn ConversationObserver>,
}

impl ManagedOrchestrator {
    pub fn new(api: Arc<dyn ResponsesApi>, model: impl Into<String>, server: McpServerTool) -> Self {
        Self {
            api,
            model: model.into(),
            instructions: DEFAULT_MCP_INSTRUCTIONS.to_string(),
            server,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn server(&self) -> &McpServerTool {
        &self.server
    }

    pub async fn run_turn(&self, user_message: &str) -> Result<ManagedTurn, AgentError> {
        log::info!(
            "Managed turn via MCP server '{}': {}",
            self.server.server_label,
            user_message
        );
        let request = ResponsesRequest {
            model: self.model.clone(),
            instructions: self.instructions.clone(),
            input: user_message.to_string(),
            tools: vec![self.server.clone()],
        };

        let output = self.api.create(&request).await?;
        if let Some(status) = &output.status {
            log::debug!("Responses API status: {}", status);
        }

        let turn = ManagedTurn::from_output(output);
        for event in &turn.events {
            match event {
                ManagedEvent::ToolCalled { error: Some(e), name, .. } => {
                    log::warn!("MCP tool '{}' reported an error: {}", name, e)
                }
                ManagedEvent::ToolsDiscovered { error: Some(e), .. } => {
                    log::warn!("MCP tool discovery reported an error: {}", e)
                }
                ManagedEvent::Error { message } => log::error!("Response failed: {}", message),
                _ => {}
            }
            self.observer.on_managed_event(event);
        }
        Ok(turn)
    }
}

#[async_trait]
impl ConversationAgent for ManagedOrchestrator {
    async fn run(&mut self, user_message: String) -> Result<String, AgentError> {
        self.run_turn(&user_message).await.map(|turn| turn.answer)
    }
}
