//! The agent step — the closed tagged union every model response decodes to.
//!
//! One parsed response yields exactly one variant. The loop dispatches on
//! the variant exhaustively; there is no string matching on step kinds.

use serde::{Deserialize, Serialize};

/// A single discrete action extracted from one block of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    /// Reasoning only — no executable action.
    Thought { content: String },

    /// An ordered plan of intended actions. Still no executable action.
    Plan { steps: Vec<String> },

    /// A block of code to run in the sandbox.
    Code {
        #[serde(default = "default_language")]
        language: String,
        code: String,
    },

    /// The final answer, ending the run without code execution.
    FinalAnswer { answer: String },
}

fn default_language() -> String {
    "python".into()
}

/// The wrapper object structured-mode responses arrive in: `{"step": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEnvelope {
    pub step: AgentStep,
}

impl AgentStep {
    /// Short kind name, used in logs and stream events.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentStep::Thought { .. } => "thought",
            AgentStep::Plan { .. } => "plan",
            AgentStep::Code { .. } => "code",
            AgentStep::FinalAnswer { .. } => "final_answer",
        }
    }

    /// Does this step carry executable code?
    pub fn is_actionable(&self) -> bool {
        matches!(self, AgentStep::Code { .. } | AgentStep::FinalAnswer { .. })
    }

    /// The JSON schema sent to the generator when structured mode is on.
    ///
    /// Statically declared — the schema is part of the contract, not derived
    /// from live types at runtime.
    pub fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "step": {
                    "oneOf": [
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "thought" },
                                "content": { "type": "string" }
                            },
                            "required": ["type", "content"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "plan" },
                                "steps": { "type": "array", "items": { "type": "string" } }
                            },
                            "required": ["type", "steps"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "code" },
                                "language": { "type": "string" },
                                "code": { "type": "string" }
                            },
                            "required": ["type", "code"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "final_answer" },
                                "answer": { "type": "string" }
                            },
                            "required": ["type", "answer"]
                        }
                    ]
                }
            },
            "required": ["step"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_step_deserializes_with_default_language() {
        let json = r#"{"step":{"type":"code","code":"print(5 * 5)"}}"#;
        let env: StepEnvelope = serde_json::from_str(json).unwrap();
        match env.step {
            AgentStep::Code { language, code } => {
                assert_eq!(language, "python");
                assert_eq!(code, "print(5 * 5)");
            }
            other => panic!("expected code step, got {:?}", other.kind()),
        }
    }

    #[test]
    fn final_answer_roundtrip() {
        let step = AgentStep::FinalAnswer {
            answer: "42".into(),
        };
        let json = serde_json::to_string(&StepEnvelope { step }).unwrap();
        assert!(json.contains(r#""type":"final_answer""#));
        let back: StepEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.step.kind(), "final_answer");
    }

    #[test]
    fn unknown_step_kind_is_rejected() {
        let json = r#"{"step":{"type":"shrug"}}"#;
        assert!(serde_json::from_str::<StepEnvelope>(json).is_err());
    }

    #[test]
    fn actionable_kinds() {
        assert!(!AgentStep::Thought { content: "hm".into() }.is_actionable());
        assert!(!AgentStep::Plan { steps: vec![] }.is_actionable());
        assert!(
            AgentStep::Code {
                language: "python".into(),
                code: "1".into()
            }
            .is_actionable()
        );
        assert!(AgentStep::FinalAnswer { answer: "x".into() }.is_actionable());
    }

    #[test]
    fn schema_names_all_variants() {
        let schema = AgentStep::response_schema();
        let rendered = schema.to_string();
        for kind in ["thought", "plan", "code", "final_answer"] {
            assert!(rendered.contains(kind), "schema missing {kind}");
        }
    }
}
