//! Console rendering of a conversation.

use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sessionbox_core::core_types::{ToolCall, ToolResult};
use sessionbox_core::errors::AgentError;
use sessionbox_core::managed::ManagedEvent;
use sessionbox_core::tools::ToolInvocation;
use sessionbox_core::trace::ConversationObserver;

const RULE_WIDTH: usize = 60;
pub const BANNER_ENDPOINT_CHARS: usize = 60;

/// Shortens an endpoint for the startup banner.
pub fn truncate_endpoint(endpoint: &str) -> String {
    if endpoint.chars().count() > BANNER_ENDPOINT_CHARS {
        let head: String = endpoint.chars().take(BANNER_ENDPOINT_CHARS).collect();
        format!("{}...", head)
    } else {
        endpoint.to_string()
    }
}

pub struct ConsoleObserver<W: Write + Send> {
    out: Mutex<W>,
    answer_shown: AtomicBool,
}

impl ConsoleObserver<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            answer_shown: AtomicBool::new(false),
        }
    }

    fn emit(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            log::debug!("Failed to write to console: {}", e);
        }
    }

    fn line(&self, text: &str) {
        self.emit(&format!("{}\n", text));
    }

    fn rule(&self) {
        self.line(&"=".repeat(RULE_WIDTH));
    }

    pub fn banner(&self, lines: &[String]) {
        for line in lines {
            self.line(line);
        }
    }

    pub fn interactive_intro(&self, detail: &str) {
        self.line("\nInteractive mode. Type 'quit' or 'exit' to leave.");
        self.line(&format!("   {}\n", detail));
    }

    pub fn interrupted(&self) {
        self.line("\n\nInterrupted, exiting.");
    }

    pub fn closing(&self) {
        self.line("");
        self.rule();
        self.line("Done.");
        self.rule();
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ConversationObserver for ConsoleObserver<W> {
    fn on_turn_started(&self, user_message: &str) {
        self.answer_shown.store(false, Ordering::SeqCst);
        self.line("");
        self.rule();
        self.line(&format!("User: {}", user_message));
        self.rule();
    }

    fn on_tool_request(&self, call: &ToolCall, invocation: Option<&ToolInvocation>) {
        match invocation {
            Some(ToolInvocation::ExecutePythonCode(args)) => {
                self.line("\n[tool] The model requested code execution:");
                self.line(&format!("   function: {}", call.name));
                self.line(&format!("```python\n{}\n```", args.code));
            }
            None => self.line(&format!(
                "\n[tool] Malformed request for '{}' (id {})",
                call.name, call.id
            )),
        }
    }

    fn on_tool_result(&self, _call: &ToolCall, result: &ToolResult) {
        if result.success {
            self.line(&format!("\nResult:\n{}", result.content));
        } else {
            self.line(&format!("\n[error] {}", result.content));
        }
    }

    fn on_managed_event(&self, event: &ManagedEvent) {
        match event {
            ManagedEvent::ToolsDiscovered {
                tool_names, error, ..
            } => {
                self.line(&format!("\n[mcp] Tools discovered: {}", tool_names.join(", ")));
                if let Some(e) = error {
                    self.line(&format!("   error: {}", e));
                }
            }
            ManagedEvent::ToolCalled {
                name,
                server_label,
                argument_preview,
                output,
                error,
            } => {
                self.line(&format!("\n[mcp] Tool call: {}", name));
                self.line(&format!("   server: {}", server_label));
                if !argument_preview.is_empty() {
                    self.line(&format!("   arguments: {}", argument_preview));
                }
                if let Some(output) = output {
                    self.line(&format!("   output: {}", output));
                }
                if let Some(e) = error {
                    self.line(&format!("   error: {}", e));
                }
            }
            ManagedEvent::Message { text } => {
                self.answer_shown.store(true, Ordering::SeqCst);
                self.line(&format!("\nAssistant: {}", text));
            }
            ManagedEvent::Error { message } => self.line(&format!("\n[error] {}", message)),
        }
    }

    fn on_final_answer(&self, answer: &str) {
        if !self.answer_shown.swap(false, Ordering::SeqCst) {
            self.line(&format!("\nAssistant: {}", answer));
        }
    }

    fn on_turn_failed(&self, error: &AgentError) {
        self.line(&format!("\n[error] {}", error));
    }

    fn on_awaiting_input(&self) {
        self.emit("\nYou: ");
    }
}
