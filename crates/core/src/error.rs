//! Error types for the sandloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Recoverability matters more than the hierarchy here: generation, parse,
//! and execution failures are all surfaced back to the model as corrective
//! turns and consume a step — they never abort a run. The only
//! terminal-without-answer condition is step-budget exhaustion, which is a
//! defined outcome, not an error.

use thiserror::Error;

/// The top-level error type for all sandloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Step parse errors ---
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    // --- Sandbox transport errors ---
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Rehydration errors ---
    #[error("Rehydration error: {0}")]
    Rehydration(#[from] RehydrationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the text-generation capability. Any failure mode collapses
/// into one of these — there is no partial or garbled success.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The model's output did not decode into a valid step.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(String),

    #[error("response did not match any step schema: {0}")]
    UnknownStep(String),
}

/// Transport-level sandbox failures (the executor sidecar is unreachable or
/// returned garbage). Adapters fold these into `ExecutionOutcome::Failure`
/// before the loop sees them; the variants exist for adapter internals and
/// logging.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("sandbox unreachable: {0}")]
    Transport(String),

    #[error("sandbox protocol violation: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Stored record failed to decode: {0}")]
    Corrupt(String),
}

/// Replaying persisted definitions into a fresh sandbox failed.
#[derive(Debug, Clone, Error)]
#[error("definition replay failed: {0}")]
pub struct RehydrationError(pub String);
