//! Runs an imperative cell body against the shared namespace.
//!
//! Stdout is an in-memory buffer the interpreter's `print` statement appends
//! to. The call runs on a blocking worker thread (`tokio::task::spawn_blocking`)
//! raced against `tokio::time::timeout` (default 30s). On timeout the blocking
//! task is detached — true cooperative cancellation is out of scope — and a
//! `Timeout` error is reported.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::Error;
use crate::lang::interpreter::{Interpreter, RuntimeValue};
use crate::lang::parser::parse;
use crate::value::Value;

/// The default wall-clock deadline for a single cell execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ImperativeSuccess {
    pub outputs: Vec<String>,
    /// Every binding visible at the end of the run, keyed by name. The
    /// scheduler picks out only the cell's declared `defs` from this map.
    pub namespace: HashMap<String, Value>,
}

pub enum ImperativeOutcome {
    Success(ImperativeSuccess),
    Failure(String),
    Timeout,
}

pub async fn execute(code: String, namespace: HashMap<String, Value>, deadline: Duration) -> ImperativeOutcome {
    let task = tokio::task::spawn_blocking(move || run_blocking(&code, namespace));
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_join_error)) => ImperativeOutcome::Failure("execution panicked".to_string()),
        Err(_elapsed) => ImperativeOutcome::Timeout,
    }
}

fn run_blocking(code: &str, namespace: HashMap<String, Value>) -> ImperativeOutcome {
    let module = match parse(code) {
        Ok(m) => m,
        Err(e) => return ImperativeOutcome::Failure(e.to_string()),
    };
    let globals: HashMap<String, RuntimeValue> =
        namespace.iter().map(|(k, v)| (k.clone(), RuntimeValue::from_value(v))).collect();
    let mut interp = Interpreter::new(globals);
    match interp.run(&module) {
        Ok(()) => {
            let namespace = interp.globals.iter().map(|(k, v)| (k.clone(), v.to_value())).collect();
            ImperativeOutcome::Success(ImperativeSuccess { outputs: interp.stdout, namespace })
        }
        Err(e) => ImperativeOutcome::Failure(render_error(&e)),
    }
}

fn render_error(e: &Error) -> String {
    e.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_captures_stdout_and_defs() {
        let outcome = execute("x = 10\nprint(x)\n".to_string(), HashMap::new(), DEFAULT_TIMEOUT).await;
        match outcome {
            ImperativeOutcome::Success(s) => {
                assert_eq!(s.outputs, vec!["10".to_string()]);
                assert_eq!(s.namespace.get("x"), Some(&Value::Int(10)));
            }
            _ => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn name_error_surfaces_as_failure() {
        let outcome = execute("y = undefined_name\n".to_string(), HashMap::new(), DEFAULT_TIMEOUT).await;
        match outcome {
            ImperativeOutcome::Failure(msg) => assert!(msg.contains("undefined_name")),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn reads_prior_namespace_bindings() {
        let mut ns = HashMap::new();
        ns.insert("x".to_string(), Value::Int(5));
        let outcome = execute("y = x + 1\n".to_string(), ns, DEFAULT_TIMEOUT).await;
        match outcome {
            ImperativeOutcome::Success(s) => assert_eq!(s.namespace.get("y"), Some(&Value::Int(6))),
            _ => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn infinite_loop_times_out() {
        let outcome = execute(
            "while true:\n    x = 1\n".to_string(),
            HashMap::new(),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(outcome, ImperativeOutcome::Timeout));
    }
}
