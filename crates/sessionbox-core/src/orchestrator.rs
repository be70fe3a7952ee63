//! Function-calling orchestration loop.
//!
//! `ConversationOrchestrator` drives one user turn through the bounded state
//! machine `AwaitingModel -> ModelResponded -> {Done | DispatchingTools}`.
//! Tool requests are parsed against the declared catalog, executed one at a
//! time against the remote sandbox of the conversation's session, and fed
//! back to the model as tool results until it answers in plain text or the
//! round budget runs out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core_types::{LLMResponse, Message, ToolCall, ToolResult, Transcript};
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::sandbox::{ExecutionOutcome, SandboxClient, DEFAULT_EXECUTION_TIMEOUT};
use crate::session::SessionContext;
use crate::tools::{ToolCatalog, ToolInvocation};
use crate::trace::{ConversationObserver, NoopObserver, RoundRecord};

pub const DEFAULT_MAX_ROUNDS: usize = 10;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can run Python code to \
answer the user's questions. Use the execute_python_code tool whenever a calculation or data \
processing is needed, and always print() the results you want to see.";

/// Anything that turns one user message into one answer.
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    async fn run(&mut self, user_message: String) -> Result<String, AgentError>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on model calls per user turn.
    pub max_rounds: usize,
    pub system_prompt: String,
    pub execution_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub rounds: Vec<RoundRecord>,
    pub transcript: Transcript,
    pub model_calls: usize,
}

enum TurnState {
    AwaitingModel,
    ModelResponded(LLMResponse),
    DispatchingTools { thought: String, calls: Vec<ToolCall> },
    Done(String),
}

pub struct ConversationOrchestrator {
    llm: Arc<dyn LLM>,
    sandbox: Arc<dyn SandboxClient>,
    catalog: ToolCatalog,
    session: SessionContext,
    config: OrchestratorConfig,
    observer: Arc<dyn ConversationObserver>,
}

impl ConversationOrchestrator {
    pub fn new(
        llm: Arc<dyn LLM>,
        sandbox: Arc<dyn SandboxClient>,
        session: SessionContext,
        config: OrchestratorConfig,
    ) -> Result<Self, AgentError> {
        if config.max_rounds == 0 {
            return Err(AgentError::ConfigError(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            llm,
            sandbox,
            catalog: ToolCatalog::code_interpreter()?,
            session,
            config,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one user turn on a fresh transcript. Only the sandbox session
    /// carries state from earlier turns.
    pub async fn run_turn(&self, user_message: &str) -> Result<TurnOutcome, AgentError> {
        log::info!(
            "Turn started in session {}: {}",
            self.session.id(),
            user_message
        );

        let mut transcript = Transcript::new();
        if !self.config.system_prompt.is_empty() {
            transcript.push(Message::system(self.config.system_prompt.clone()));
        }
        transcript.push(Message::user(user_message));

        let mut rounds = Vec::new();
        let mut model_calls = 0;
        let mut state = TurnState::AwaitingModel;

        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    model_calls += 1;
                    log::info!("Model round #{}", model_calls);
                    let response = self
                        .llm
                        .generate(transcript.messages().to_vec(), Some(self.catalog.metadata()))
                        .await
                        .map_err(|e| {
                            log::error!("Model call failed in round {}: {}", model_calls, e);
                            e
                        })?;
                    TurnState::ModelResponded(response)
                }
                TurnState::ModelResponded(response) => {
                    if !response.requested_tools() {
                        TurnState::Done(response.content.unwrap_or_default())
                    } else if model_calls >= self.config.max_rounds {
                        log::warn!(
                            "Model still requested tools after {} rounds, giving up",
                            model_calls
                        );
                        return Err(AgentError::BudgetExceeded {
                            max_rounds: self.config.max_rounds,
                        });
                    } else {
                        TurnState::DispatchingTools {
                            thought: response.content.unwrap_or_default(),
                            calls: response.tool_calls.unwrap_or_default(),
                        }
                    }
                }
                TurnState::DispatchingTools { thought, calls } => {
                    log::info!("Dispatching {} tool call(s)", calls.len());
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(self.dispatch(call).await);
                    }

                    transcript.push(Message::assistant(thought.clone(), calls.clone()));
                    for result in &results {
                        transcript.push(Message::tool_result(result));
                    }

                    let record = RoundRecord {
                        round: model_calls,
                        thought: Some(thought).filter(|t| !t.trim().is_empty()),
                        tool_calls: calls,
                        tool_results: results,
                    };
                    self.observer.on_round_complete(&record);
                    rounds.push(record);
                    TurnState::AwaitingModel
                }
                TurnState::Done(answer) => {
                    log::info!("Turn finished after {} model call(s)", model_calls);
                    transcript.push(Message::assistant(answer.clone(), Vec::new()));
                    return Ok(TurnOutcome {
                        answer,
                        rounds,
                        transcript,
                        model_calls,
                    });
                }
            };
        }
    }

    /// Always yields exactly one result for `call`; failures become error
    /// results the model can react to.
    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let invocation = self.catalog.parse(call);
        self.observer.on_tool_request(call, invocation.as_ref().ok());

        let result = match invocation {
            Err(e) => {
                log::warn!("Rejected tool call {}: {}", call.id, e);
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: format!("Error: {}", e),
                    success: false,
                }
            }
            Ok(ToolInvocation::ExecutePythonCode(args)) => {
                log::debug!("Executing code for tool call {}:\n{}", call.id, args.code);
                match self
                    .sandbox
                    .execute(&self.session, &args.code, self.config.execution_timeout)
                    .await
                {
                    Ok(outcome) => ToolResult {
                        tool_call_id: call.id.clone(),
                        content: render_outcome(&outcome),
                        success: outcome.is_success(),
                    },
                    Err(e) => {
                        log::error!("Sandbox call for tool call {} failed: {}", call.id, e);
                        ToolResult {
                            tool_call_id: call.id.clone(),
                            content: format!("An error occurred while running the code: {}", e),
                            success: false,
                        }
                    }
                }
            }
        };

        self.observer.on_tool_result(call, &result);
        result
    }
}

/// Tool-result text for a completed execution. Non-success statuses are
/// prefixed so the model can tell a failed run from quiet output.
pub fn render_outcome(outcome: &ExecutionOutcome) -> String {
    let output = outcome.normalized_output();
    if outcome.is_success() {
        output
    } else {
        format!("[status: {}]\n{}", outcome.status, output)
    }
}

#[async_trait]
impl ConversationAgent for ConversationOrchestrator {
    async fn run(&mut self, user_message: String) -> Result<String, AgentError> {
        self.run_turn(&user_message).await.map(|outcome| outcome.answer)
    }
}
