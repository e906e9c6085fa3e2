//! Scripted sandbox — a deterministic stand-in for tests and local
//! development without the executor sidecar.
//!
//! Plays back a queue of outcomes, one per `execute` call, and records
//! every submitted source so tests can assert on what actually ran
//! (rehydration preambles included).

use async_trait::async_trait;
use sandloop_core::sandbox::{ExecutionOutcome, Sandbox, SandboxFactory};
use std::sync::Mutex;

/// A sandbox that replays scripted outcomes in order.
pub struct ScriptedSandbox {
    outcomes: Mutex<Vec<ExecutionOutcome>>,
    executed: Mutex<Vec<String>>,
    cursor: Mutex<usize>,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            executed: Mutex::new(Vec::new()),
            cursor: Mutex::new(0),
        }
    }

    /// A sandbox that answers every execution with the same output.
    pub fn always_output(text: &str) -> Self {
        Self {
            outcomes: Mutex::new(vec![ExecutionOutcome::Output(text.into())]),
            executed: Mutex::new(Vec::new()),
            cursor: Mutex::new(usize::MAX), // sentinel: repeat last outcome
        }
    }

    /// Every source submitted so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, source: &str) -> ExecutionOutcome {
        self.executed.lock().unwrap().push(source.to_string());

        let outcomes = self.outcomes.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();

        if *cursor == usize::MAX {
            return outcomes[0].clone();
        }

        let outcome = outcomes.get(*cursor).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedSandbox: no more outcomes (call #{}, have {})",
                *cursor,
                outcomes.len()
            )
        });
        *cursor += 1;
        outcome
    }
}

/// Hands out pre-built scripted sandboxes, one per `create` call.
pub struct ScriptedSandboxFactory {
    queue: Mutex<Vec<ScriptedSandbox>>,
}

impl ScriptedSandboxFactory {
    pub fn new(sandboxes: Vec<ScriptedSandbox>) -> Self {
        Self {
            queue: Mutex::new(sandboxes),
        }
    }
}

#[async_trait]
impl SandboxFactory for ScriptedSandboxFactory {
    async fn create(&self) -> Box<dyn Sandbox> {
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            panic!("ScriptedSandboxFactory: no more sandboxes");
        }
        Box::new(queue.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_outcomes_in_order() {
        let sandbox = ScriptedSandbox::new(vec![
            ExecutionOutcome::Output("25\n".into()),
            ExecutionOutcome::Completed("25".into()),
        ]);

        assert_eq!(
            sandbox.execute("print(5 * 5)").await,
            ExecutionOutcome::Output("25\n".into())
        );
        assert_eq!(
            sandbox.execute("final_answer('25')").await,
            ExecutionOutcome::Completed("25".into())
        );
        assert_eq!(sandbox.executed().len(), 2);
    }

    #[tokio::test]
    async fn always_output_repeats() {
        let sandbox = ScriptedSandbox::always_output("ok");
        for _ in 0..3 {
            assert_eq!(
                sandbox.execute("x = 1").await,
                ExecutionOutcome::Output("ok".into())
            );
        }
    }

    #[tokio::test]
    async fn records_submitted_sources() {
        let sandbox = ScriptedSandbox::always_output("ok");
        sandbox.execute("import math").await;
        sandbox.execute("print(math.pi)").await;
        let executed = sandbox.executed();
        assert_eq!(executed[0], "import math");
        assert!(executed[1].contains("math.pi"));
    }
}
