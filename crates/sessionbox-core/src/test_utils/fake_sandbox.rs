// src/test_utils/fake_sandbox.rs
//
// A tiny in-memory stand-in for a Python session pool. It understands
// `name = <expr>` and `print(<expr>)` statements where <expr> is an integer,
// a variable, `a ** b` or `a + b`. Variables live per session identifier.
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::ExecutionError;
use crate::sandbox::{ExecutionOutcome, SandboxClient};
use crate::session::SessionContext;

#[derive(Default)]
pub struct FakeSandbox {
    variables: Mutex<HashMap<String, HashMap<String, i64>>>,
    calls: Mutex<Vec<(String, String)>>,
    queued_failures: Mutex<VecDeque<ExecutionError>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `execute` call fail with `error` before running anything.
    pub fn fail_next(&self, error: ExecutionError) {
        self.queued_failures.lock().unwrap().push_back(error);
    }

    /// `(session id, code)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn eval(vars: &HashMap<String, i64>, expr: &str) -> Result<i64, String> {
        let expr = expr.trim();
        if let Some((base, exp)) = expr.split_once("**") {
            let base = Self::eval(vars, base)?;
            let exp = Self::eval(vars, exp)?;
            return Ok(base.pow(exp as u32));
        }
        if let Some((lhs, rhs)) = expr.split_once('+') {
            return Ok(Self::eval(vars, lhs)? + Self::eval(vars, rhs)?);
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(n);
        }
        vars.get(expr)
            .copied()
            .ok_or_else(|| format!("NameError: name '{}' is not defined", expr))
    }

    fn run(vars: &mut HashMap<String, i64>, code: &str) -> ExecutionOutcome {
        let mut stdout = String::new();
        let mut stderr = String::new();
        for statement in code.split(['\n', ';']) {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            let result = if let Some(inner) = statement
                .strip_prefix("print(")
                .and_then(|s| s.strip_suffix(')'))
            {
                Self::eval(vars, inner).map(|v| {
                    stdout.push_str(&format!("{}\n", v));
                })
            } else if let Some((name, expr)) = statement.split_once('=') {
                Self::eval(vars, expr).map(|v| {
                    vars.insert(name.trim().to_string(), v);
                })
            } else {
                Err(format!("SyntaxError: invalid syntax: {}", statement))
            };
            if let Err(e) = result {
                stderr = e;
                break;
            }
        }

        ExecutionOutcome {
            status: if stderr.is_empty() { "Succeeded" } else { "Failed" }.to_string(),
            execution_time_ms: Some(1),
            stdout,
            stderr,
            execution_result: None,
        }
    }
}

#[async_trait]
impl SandboxClient for FakeSandbox {
    async fn execute(
        &self,
        session: &SessionContext,
        code: &str,
        _timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let session_id = session.id().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((session_id.clone(), code.to_string()));

        if let Some(error) = self.queued_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut all = self.variables.lock().unwrap();
        let vars = all.entry(session_id).or_default();
        Ok(Self::run(vars, code))
    }
}
