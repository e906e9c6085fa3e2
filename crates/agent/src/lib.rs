//! The core agent loop — the heart of sandloop.
//!
//! One invocation follows a **generate → parse → act → observe** cycle:
//!
//! 1. **Seed** the message buffer (system prompt + windowed history + new
//!    user turn)
//! 2. **Rehydrate** the fresh sandbox from the session's persisted
//!    definitions
//! 3. **Generate** a response, **parse** it into a step
//! 4. **Code steps**: track new definitions, execute, feed the observation
//!    (or failure detail) back; **reasoning-only steps**: push an explicit
//!    corrective turn
//! 5. Stop on a completion signal / final-answer step, or after the step
//!    budget, whichever comes first.

pub mod history;
pub mod input;
pub mod prompt;
pub mod registry;
pub mod rehydrate;
pub mod runner;
pub mod step_parser;
pub mod stream_event;
pub mod test_helpers;
pub mod tracker;

pub use history::window;
pub use input::{UserPayload, format_user_content};
pub use registry::SessionRegistry;
pub use rehydrate::SessionRehydrator;
pub use runner::{AgentLoop, EXHAUSTED_ANSWER, RunOutcome};
pub use step_parser::{ParsedStep, parse_free_text, parse_structured};
pub use stream_event::{AgentStreamEvent, reassemble};
