//! Step parsing — one block of model output in, one tagged action out.
//!
//! Two modes, both pure functions of the text:
//!
//! - **Free-text**: find the first fenced code block; everything before it
//!   is the thought, the block interior is the code. No well-formed
//!   open-and-close fence pair means no code — a dangling fence must
//!   degrade, never fail.
//! - **Structured**: decode the tagged-union step directly. One recovery
//!   attempt strips an enclosing markdown fence and retries; after that the
//!   failure is a recoverable [`ParseError`] for the loop to handle.

use sandloop_core::error::ParseError;
use sandloop_core::step::{AgentStep, StepEnvelope};

const FENCE: &str = "```";

/// The result of free-text parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStep {
    /// Reasoning text preceding the code block (or the whole response).
    pub thought: String,
    /// Interior of the first well-formed fenced block, trimmed.
    pub code: Option<String>,
}

impl ParsedStep {
    /// Lift into the closed step union the loop dispatches on.
    pub fn into_step(self) -> AgentStep {
        match self.code {
            Some(code) => AgentStep::Code {
                language: "python".into(),
                code,
            },
            None => AgentStep::Thought {
                content: self.thought,
            },
        }
    }
}

/// Parse a free-form response into thought + optional code.
pub fn parse_free_text(raw: &str) -> ParsedStep {
    let no_code = || ParsedStep {
        thought: raw.trim().to_string(),
        code: None,
    };

    let Some(open) = raw.find(FENCE) else {
        return no_code();
    };

    // The info string ("python") runs to the end of the opening line.
    let after_marker = &raw[open + FENCE.len()..];
    let Some(newline) = after_marker.find('\n') else {
        // Opening marker with nothing after it on any further line.
        return no_code();
    };
    let interior = &after_marker[newline + 1..];

    // An unterminated fence degrades to "no code found".
    let Some(close) = interior.find(FENCE) else {
        return no_code();
    };

    ParsedStep {
        thought: raw[..open].trim().to_string(),
        code: Some(interior[..close].trim().to_string()),
    }
}

/// Decode a structured-mode response into a step.
///
/// Accepts both the `{"step": {...}}` envelope and a bare step object. On
/// failure, strips an enclosing markdown fence and retries once.
pub fn parse_structured(raw: &str) -> Result<AgentStep, ParseError> {
    if let Some(step) = try_decode(raw) {
        return Ok(step);
    }

    if let Some(stripped) = strip_enclosing_fence(raw)
        && let Some(step) = try_decode(stripped)
    {
        return Ok(step);
    }

    // Distinguish malformed JSON from well-formed JSON of the wrong shape.
    match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(_) => Err(ParseError::UnknownStep(truncate(raw, 200))),
        Err(e) => Err(ParseError::Json(e.to_string())),
    }
}

fn try_decode(raw: &str) -> Option<AgentStep> {
    let raw = raw.trim();
    if let Ok(envelope) = serde_json::from_str::<StepEnvelope>(raw) {
        return Some(envelope.step);
    }
    serde_json::from_str::<AgentStep>(raw).ok()
}

/// Strip one enclosing ``` fence (with optional info string), if present.
fn strip_enclosing_fence(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix(FENCE)?;
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    let body = body.trim_end().strip_suffix(FENCE)?;
    Some(body.trim())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_and_code_split_at_first_fence() {
        let raw = "I will compute the square.\n```python\nprint(5 * 5)\n```\ntrailing chatter";
        let parsed = parse_free_text(raw);
        assert_eq!(parsed.thought, "I will compute the square.");
        assert_eq!(parsed.code.as_deref(), Some("print(5 * 5)"));
    }

    #[test]
    fn no_fence_is_all_thought() {
        let raw = "  Let me think about this.  ";
        let parsed = parse_free_text(raw);
        assert_eq!(parsed.thought, "Let me think about this.");
        assert!(parsed.code.is_none());
    }

    #[test]
    fn reparsing_is_idempotent() {
        let raw = "Just reasoning, no code here.";
        let first = parse_free_text(raw);
        let second = parse_free_text(&first.thought);
        assert_eq!(first, second);
    }

    #[test]
    fn dangling_fence_degrades_to_no_code() {
        let raw = "Thought first.\n```python\nprint('never closed')";
        let parsed = parse_free_text(raw);
        assert!(parsed.code.is_none());
        assert!(parsed.thought.contains("never closed"));
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let raw = "```\nx = 1\n```";
        let parsed = parse_free_text(raw);
        assert_eq!(parsed.code.as_deref(), Some("x = 1"));
        assert_eq!(parsed.thought, "");
    }

    #[test]
    fn fence_with_no_newline_is_no_code() {
        let parsed = parse_free_text("```python");
        assert!(parsed.code.is_none());
    }

    #[test]
    fn into_step_maps_code_and_thought() {
        let with_code = parse_free_text("go\n```python\n1\n```").into_step();
        assert_eq!(with_code.kind(), "code");

        let without = parse_free_text("hmm").into_step();
        assert_eq!(without.kind(), "thought");
    }

    #[test]
    fn structured_envelope_decodes() {
        let raw = r#"{"step":{"type":"final_answer","answer":"25"}}"#;
        let step = parse_structured(raw).unwrap();
        assert_eq!(step, AgentStep::FinalAnswer { answer: "25".into() });
    }

    #[test]
    fn structured_bare_step_decodes() {
        let raw = r#"{"type":"thought","content":"thinking"}"#;
        assert_eq!(parse_structured(raw).unwrap().kind(), "thought");
    }

    #[test]
    fn structured_recovers_from_markdown_fence() {
        let raw = "```json\n{\"step\":{\"type\":\"code\",\"code\":\"print(1)\"}}\n```";
        let step = parse_structured(raw).unwrap();
        assert_eq!(step.kind(), "code");
    }

    #[test]
    fn structured_bad_json_is_json_error() {
        assert!(matches!(
            parse_structured("not json at all"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn structured_wrong_shape_is_unknown_step() {
        assert!(matches!(
            parse_structured(r#"{"step":{"type":"shrug"}}"#),
            Err(ParseError::UnknownStep(_))
        ));
    }
}
