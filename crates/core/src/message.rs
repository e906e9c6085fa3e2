//! Message and session-log domain types.
//!
//! These are the value objects that flow through the whole system: the
//! caller's query becomes a user message, the loop appends assistant and
//! observation messages, and the store persists the lot per session.
//!
//! A single logical turn is a *run* of messages: one real user message
//! followed by interleaved reasoning/observation messages (`is_reasoning`
//! set). Windowing code relies on that shape and must never split a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions — seeded per invocation, never persisted
    System,
    /// The end user (also carries observations fed back to the model)
    User,
    /// The model
    Assistant,
}

/// Message content: plain text or an ordered list of multi-part segments.
///
/// Multi-part content matches the chat-completions wire shape, so a message
/// built here serializes directly into a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One segment of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageSource },
}

/// An image reference — always an inline data URI by the time it reaches
/// the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    pub url: String,
}

impl Content {
    /// Flatten to the textual portion of the content (image parts are
    /// skipped). Used for logging, persistence checks, and parsing.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(s) => s.is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// A single message in a session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The content (text or multi-part)
    pub content: Content,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Intermediate loop chatter (thoughts, observations, corrective turns)
    /// versus the user-visible final exchange
    #[serde(default)]
    pub is_reasoning: bool,
}

impl Message {
    fn new(role: Role, content: Content, is_reasoning: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            is_reasoning,
        }
    }

    /// Create a new real (non-reasoning) user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content.into(), false)
    }

    /// Create a new final assistant message.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content.into(), false)
    }

    /// Create a system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content.into(), false)
    }

    /// Create an intermediate reasoning message (loop chatter).
    pub fn reasoning(role: Role, content: impl Into<Content>) -> Self {
        Self::new(role, content.into(), true)
    }

    /// Is this a real user turn (the windowing unit)?
    pub fn is_real_user(&self) -> bool {
        self.role == Role::User && !self.is_reasoning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Plot the data");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.as_text(), "Plot the data");
        assert!(!msg.is_reasoning);
        assert!(msg.is_real_user());
    }

    #[test]
    fn reasoning_message_is_not_a_real_turn() {
        let msg = Message::reasoning(Role::User, "Observation: 25");
        assert!(msg.is_reasoning);
        assert!(!msg.is_real_user());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content.as_text(), "Test message");
        assert_eq!(back.role, Role::User);
    }

    #[test]
    fn multipart_content_wire_shape() {
        let content = Content::Parts(vec![
            ContentPart::Text {
                text: "describe this".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageSource {
                    url: "data:image/jpeg;base64,AAAA".into(),
                },
            },
        ]);
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json[0]["type"], "text");
        assert_eq!(json[1]["type"], "image_url");
        assert_eq!(json[1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn multipart_as_text_skips_images() {
        let content = Content::Parts(vec![
            ContentPart::Text { text: "a".into() },
            ContentPart::ImageUrl {
                image_url: ImageSource { url: "data:x".into() },
            },
            ContentPart::Text { text: "b".into() },
        ]);
        assert_eq!(content.as_text(), "a\nb");
    }
}
