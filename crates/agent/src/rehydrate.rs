//! Session rehydration — replaying persisted definitions into a fresh
//! sandbox before any new code runs.
//!
//! Sandbox instances are created per invocation, so the interpreter
//! namespace a long-running process would have accumulated has to be
//! rebuilt: all persisted imports first, then all persisted function
//! sources, executed once as a single preamble.
//!
//! Replay can fail (a persisted function may reference a symbol that is no
//! longer importable). Whether the turn proceeds with the partial namespace
//! or aborts is a deployment choice, not something to guess — both
//! behaviors are implemented behind [`RehydrationPolicy`].

use sandloop_config::RehydrationPolicy;
use sandloop_core::definitions::DefinitionSet;
use sandloop_core::error::RehydrationError;
use sandloop_core::sandbox::{ExecutionOutcome, Sandbox};
use tracing::{debug, warn};

/// Replays a session's definition set into a fresh sandbox.
pub struct SessionRehydrator {
    policy: RehydrationPolicy,
}

impl SessionRehydrator {
    pub fn new(policy: RehydrationPolicy) -> Self {
        Self { policy }
    }

    /// Execute the replay preamble against `sandbox`.
    ///
    /// An empty definition set is a no-op. On replay failure the configured
    /// policy decides: `Proceed` logs and returns `Ok` (the namespace is
    /// partially populated), `Abort` fails the turn.
    pub async fn rehydrate(
        &self,
        sandbox: &dyn Sandbox,
        definitions: &DefinitionSet,
    ) -> Result<(), RehydrationError> {
        if definitions.is_empty() {
            return Ok(());
        }

        let preamble = definitions.preamble();
        debug!(
            functions = definitions.functions.len(),
            imports = definitions.imports.len(),
            "Rehydrating sandbox namespace"
        );

        match sandbox.execute(&preamble).await {
            ExecutionOutcome::Output(_) => Ok(()),
            ExecutionOutcome::Completed(value) => {
                // A bare def/import preamble has no business completing the
                // task; treat it as suspect but non-fatal.
                warn!(value = %value, "Rehydration preamble signalled completion");
                Ok(())
            }
            ExecutionOutcome::Failure(detail) => match self.policy {
                RehydrationPolicy::Proceed => {
                    warn!(detail = %detail, "Rehydration failed; proceeding with partial namespace");
                    Ok(())
                }
                RehydrationPolicy::Abort => Err(RehydrationError(detail)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandloop_core::definitions::Definitions;
    use sandloop_sandbox::ScriptedSandbox;
    use std::collections::BTreeMap;

    fn definitions() -> DefinitionSet {
        let mut functions = BTreeMap::new();
        functions.insert(
            "f".to_string(),
            "def f(x):\n    return x + 999\n".to_string(),
        );
        let mut set = DefinitionSet::new();
        set.merge(Definitions {
            functions,
            imports: vec!["import math".to_string()],
        });
        set
    }

    #[tokio::test]
    async fn replays_imports_then_functions_once() {
        let sandbox = ScriptedSandbox::always_output("ok");
        let rehydrator = SessionRehydrator::new(RehydrationPolicy::Proceed);

        rehydrator
            .rehydrate(&sandbox, &definitions())
            .await
            .unwrap();

        let executed = sandbox.executed();
        assert_eq!(executed.len(), 1);
        let preamble = &executed[0];
        assert!(preamble.find("import math").unwrap() < preamble.find("def f(x):").unwrap());
    }

    #[tokio::test]
    async fn empty_set_skips_the_sandbox() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let rehydrator = SessionRehydrator::new(RehydrationPolicy::Abort);

        rehydrator
            .rehydrate(&sandbox, &DefinitionSet::new())
            .await
            .unwrap();
        assert!(sandbox.executed().is_empty());
    }

    #[tokio::test]
    async fn proceed_policy_swallows_replay_failure() {
        let sandbox = ScriptedSandbox::new(vec![ExecutionOutcome::Failure(
            "ModuleNotFoundError: No module named 'pandas'".into(),
        )]);
        let rehydrator = SessionRehydrator::new(RehydrationPolicy::Proceed);

        assert!(rehydrator.rehydrate(&sandbox, &definitions()).await.is_ok());
    }

    #[tokio::test]
    async fn abort_policy_fails_the_turn() {
        let sandbox = ScriptedSandbox::new(vec![ExecutionOutcome::Failure(
            "ModuleNotFoundError: No module named 'pandas'".into(),
        )]);
        let rehydrator = SessionRehydrator::new(RehydrationPolicy::Abort);

        let err = rehydrator
            .rehydrate(&sandbox, &definitions())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ModuleNotFoundError"));
    }
}
