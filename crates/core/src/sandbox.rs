//! Sandbox trait — the contract around the restricted code-execution
//! capability.
//!
//! The sandbox itself is an external collaborator; its isolation guarantees
//! are assumed, not provided here. What this module pins down is the shape
//! of the contract: every execution produces exactly one of three closed
//! outcomes, and the "task complete" signal is its own variant — never an
//! error overload, never conflated with ordinary output.
//!
//! One adapter instance corresponds to one interpreter namespace. Adapters
//! are created fresh per run; cross-turn state comes back via rehydration,
//! not via a long-lived instance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The result of executing one code block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Captured textual output / printed log. The loop feeds this back as
    /// the next observation.
    Output(String),

    /// The code raised, used a disallowed capability, or the sandbox itself
    /// was unreachable. Never fatal — the detail goes back to the model
    /// verbatim so it can self-correct.
    Failure(String),

    /// The executed code declared the task finished and supplied the final
    /// value. Ends the loop.
    Completed(String),
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(_))
    }
}

/// The sandboxed execution capability.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// A human-readable name for this adapter (e.g., "http", "scripted").
    fn name(&self) -> &str;

    /// Execute source text against this instance's namespace.
    ///
    /// Infallible at the signature level on purpose: transport and
    /// interpreter failures alike are folded into
    /// [`ExecutionOutcome::Failure`] so the loop sees one closed outcome
    /// per execution.
    async fn execute(&self, source: &str) -> ExecutionOutcome;
}

/// Creates a fresh, empty sandbox instance per run.
///
/// Each call must return an adapter whose namespace is independent of every
/// previously returned instance.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    async fn create(&self) -> Box<dyn Sandbox>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_distinguishable_from_output() {
        let done = ExecutionOutcome::Completed("25".into());
        let out = ExecutionOutcome::Output("25".into());
        assert!(done.is_completed());
        assert!(!out.is_completed());
        assert_ne!(done, out);
    }

    #[test]
    fn outcome_serialization_is_tagged() {
        let json = serde_json::to_string(&ExecutionOutcome::Failure(
            "ZeroDivisionError: division by zero".into(),
        ))
        .unwrap();
        assert!(json.contains(r#""kind":"failure""#));
        assert!(json.contains("ZeroDivisionError"));
    }
}
