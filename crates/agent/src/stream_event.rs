//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps token deltas and execution results into
//! higher-level events a gateway can forward to clients over an ordered
//! duplex channel. Consumers buffer `Token` events between boundaries to
//! reconstruct discrete messages for persistence — [`reassemble`] is the
//! reference implementation of that buffering.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during streaming execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the generator.
    Token { content: String },

    /// One loop step finished generating; the buffered tokens up to here
    /// form one assistant message.
    StepBoundary { step: usize, kind: String },

    /// Result of executing a code step.
    Observation { content: String, success: bool },

    /// An error occurred mid-stream.
    Error { message: String },

    /// The run is complete.
    Final {
        answer: String,
        steps: usize,
        exhausted: bool,
    },
}

impl AgentStreamEvent {
    /// Wire event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::StepBoundary { .. } => "step_boundary",
            Self::Observation { .. } => "observation",
            Self::Error { .. } => "error",
            Self::Final { .. } => "final",
        }
    }
}

/// Rebuild discrete assistant messages from an event sequence by buffering
/// tokens between boundary events.
pub fn reassemble(events: &[AgentStreamEvent]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut buffer = String::new();

    for event in events {
        match event {
            AgentStreamEvent::Token { content } => buffer.push_str(content),
            AgentStreamEvent::StepBoundary { .. } | AgentStreamEvent::Final { .. } => {
                if !buffer.is_empty() {
                    messages.push(std::mem::take(&mut buffer));
                }
            }
            AgentStreamEvent::Observation { .. } | AgentStreamEvent::Error { .. } => {}
        }
    }

    if !buffer.is_empty() {
        messages.push(buffer);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_is_tagged() {
        let event = AgentStreamEvent::Token {
            content: "Tho".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));

        let event = AgentStreamEvent::Final {
            answer: "25".into(),
            steps: 2,
            exhausted: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"final""#));
        assert!(json.contains(r#""steps":2"#));
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"observation","content":"25\n","success":true}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Observation { content, success } => {
                assert_eq!(content, "25\n");
                assert!(success);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn reassemble_buffers_tokens_between_boundaries() {
        let events = vec![
            AgentStreamEvent::Token { content: "I ".into() },
            AgentStreamEvent::Token { content: "compute.".into() },
            AgentStreamEvent::StepBoundary { step: 0, kind: "code".into() },
            AgentStreamEvent::Observation { content: "25\n".into(), success: true },
            AgentStreamEvent::Token { content: "Done".into() },
            AgentStreamEvent::Final { answer: "25".into(), steps: 2, exhausted: false },
        ];

        let messages = reassemble(&events);
        assert_eq!(messages, vec!["I compute.".to_string(), "Done".to_string()]);
    }

    #[test]
    fn reassemble_flushes_trailing_tokens() {
        let events = vec![AgentStreamEvent::Token { content: "tail".into() }];
        assert_eq!(reassemble(&events), vec!["tail".to_string()]);
    }
}
