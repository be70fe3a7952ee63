//! Tool-calling orchestration between a language model and a remote,
//! session-scoped Python sandbox.
//!
//! The crate is organized around a few subsystems:
//!
//! - **Orchestration**: the bounded function-calling loop (`orchestrator`) and
//!   the managed MCP mode where the model endpoint drives the tool server
//!   itself (`managed`)
//! - **Model integration**: Azure OpenAI / OpenAI chat completions and the
//!   Responses API (`llm`)
//! - **Sandbox execution**: dynamic-session pool client, session identity and
//!   credentials (`sandbox`, `session`, `auth`)
//! - **Tools**: the declared tool catalog and argument validation (`tools`)
//! - **Drivers**: scripted and interactive conversation loops (`driver`)
//! - **Configuration**: YAML file plus environment resolution (`config`)

pub mod auth;
pub mod config;
pub mod core_types;
pub mod driver;
pub mod errors;
pub mod llm;
pub mod managed;
pub mod orchestrator;
pub mod sandbox;
pub mod session;
pub mod tools;
pub mod trace;

pub use auth::{AzureCliCredential, CredentialProvider, StaticTokenCredential};
pub use config::*;
pub use errors::{AgentError, ExecutionError};
pub use llm::LLM;
pub use managed::{ManagedEvent, ManagedOrchestrator};
pub use orchestrator::{ConversationAgent, ConversationOrchestrator, OrchestratorConfig};
pub use sandbox::{DynamicSessionsClient, ExecutionOutcome, SandboxClient};
pub use session::{SessionContext, SessionId};
pub use trace::{ConversationObserver, NoopObserver, RoundRecord};

#[cfg(test)]
pub mod test_utils;
