//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Render Cycle Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Planner error: {0}")]
    Planner(String),

    #[error("Malformed planner reply: {0}")]
    MalformedReply(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("FAQ error: {0}")]
    Faq(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Invalid transition: {event} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    #[error("Timed out after {seconds}s during {stage}")]
    Timeout { stage: &'static str, seconds: u64 },

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
