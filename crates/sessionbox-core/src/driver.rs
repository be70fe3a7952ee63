//! Scripted and interactive drivers.
//!
//! A driver feeds user messages to a `ConversationAgent` one turn at a time
//! and reports each turn to a `ConversationObserver`. Failures that only end
//! the current turn are reported and the driver moves on; fatal ones stop the
//! run and are returned to the caller.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::errors::AgentError;
use crate::orchestrator::ConversationAgent;
use crate::trace::ConversationObserver;

pub const DEFAULT_DEMO_PROMPTS: [&str; 3] = [
    "Calculate 2 to the 20th power",
    "Display all prime numbers from 1 to 100",
    "Using pandas, create population data for Japan's five major cities (Tokyo, Osaka, \
     Nagoya, Sapporo, Fukuoka), sort it by population in descending order, and display it",
];

pub const EXIT_KEYWORDS: [&str; 3] = ["quit", "exit", "q"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DriverSummary {
    /// Turns that ran to completion or failed without ending the run.
    pub turns: usize,
    pub failures: usize,
    pub interrupted: bool,
}

pub fn is_exit_keyword(line: &str) -> bool {
    let line = line.trim();
    EXIT_KEYWORDS.iter().any(|k| line.eq_ignore_ascii_case(k))
}

pub fn default_prompts() -> Vec<String> {
    DEFAULT_DEMO_PROMPTS.iter().map(|p| p.to_string()).collect()
}

fn settle_turn(
    summary: &mut DriverSummary,
    result: Result<String, AgentError>,
    observer: &dyn ConversationObserver,
) -> Result<(), AgentError> {
    summary.turns += 1;
    match result {
        Ok(answer) => {
            observer.on_final_answer(&answer);
            Ok(())
        }
        Err(e) => {
            observer.on_turn_failed(&e);
            if e.is_fatal() {
                log::error!("Stopping after fatal error: {}", e);
                return Err(e);
            }
            log::warn!("Turn failed, continuing: {}", e);
            summary.failures += 1;
            Ok(())
        }
    }
}

/// Runs every prompt in order, each as its own turn.
pub async fn run_scripted<A, S>(
    agent: &mut A,
    prompts: &[String],
    observer: &dyn ConversationObserver,
    shutdown: S,
) -> Result<DriverSummary, AgentError>
where
    A: ConversationAgent + ?Sized,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = DriverSummary::default();

    for prompt in prompts {
        observer.on_turn_started(prompt);
        let result = tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("Interrupted during scripted turn");
                summary.interrupted = true;
                break;
            }
            result = agent.run(prompt.clone()) => result,
        };
        settle_turn(&mut summary, result, observer)?;
    }

    Ok(summary)
}

/// Reads one message per line until an exit keyword, end of input or
/// `shutdown` resolves. Blank lines are skipped.
pub async fn run_interactive<A, R, S>(
    agent: &mut A,
    input: R,
    observer: &dyn ConversationObserver,
    shutdown: S,
) -> Result<DriverSummary, AgentError>
where
    A: ConversationAgent + ?Sized,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();
    let mut summary = DriverSummary::default();

    loop {
        observer.on_awaiting_input();
        let line = tokio::select! {
            biased;
            _ = &mut shutdown => {
                summary.interrupted = true;
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            log::info!("Input closed");
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_exit_keyword(message) {
            log::info!("Exit keyword received");
            break;
        }

        observer.on_turn_started(message);
        let result = tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("Interrupted during turn");
                summary.interrupted = true;
                break;
            }
            result = agent.run(message.to_string()) => result,
        };
        settle_turn(&mut summary, result, observer)?;
    }

    Ok(summary)
}
