//! History windowing — bounding the conversation fed back into the loop.
//!
//! A single logical turn is a *run* of messages: one real user message
//! followed by interleaved reasoning and observation messages. A window
//! must never split a run, so the bound is computed in two phases:
//!
//! 1. Walk the log backward counting only real user messages (`role ==
//!    user` and not reasoning), treating the caller's new query — already
//!    appended to the log — as one more real turn, so the target count is
//!    `last_n + 1`. The boundary lands just past the last counted message;
//!    fewer real turns than the target means boundary 0.
//! 2. From the boundary, scan forward to the next real user message. That
//!    re-alignment skips the counted turn's trailing reasoning run so the
//!    window starts on a turn boundary. A boundary past the end of the log
//!    yields an empty window.
//!
//! The `include_reasoning` filter is applied to the resulting slice as the
//! final step.

use sandloop_core::message::Message;

/// Compute the bounded history slice.
///
/// `last_n == -1` returns the entire log (filtered); `last_n >= 0` bounds
/// the window as described in the module docs.
pub fn window(log: &[Message], last_n: i64, include_reasoning: bool) -> Vec<Message> {
    if last_n < 0 {
        return filtered(log, include_reasoning);
    }

    let target = last_n as usize + 1;

    // Phase 1: backward count of real user turns.
    let mut boundary = 0;
    let mut counted = 0;
    for (idx, message) in log.iter().enumerate().rev() {
        if message.is_real_user() {
            counted += 1;
            if counted == target {
                boundary = idx + 1;
                break;
            }
        }
    }

    // Phase 2: forward re-alignment to the next turn start.
    let Some(start) = log[boundary.min(log.len())..]
        .iter()
        .position(|m| m.is_real_user())
        .map(|offset| boundary + offset)
    else {
        return Vec::new();
    };

    filtered(&log[start..], include_reasoning)
}

fn filtered(slice: &[Message], include_reasoning: bool) -> Vec<Message> {
    slice
        .iter()
        .filter(|m| include_reasoning || !m.is_reasoning)
        .cloned()
        .collect()
}
