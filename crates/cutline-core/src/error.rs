//! Error types for Cutline.

use thiserror::Error;

/// Main error type for Cutline operations.
///
/// Most timeline operations are total (they clamp instead of failing), so
/// these variants mostly describe misuse of the session protocol or
/// failures reported by external collaborators.
#[derive(Error, Debug)]
pub enum CutlineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Playback engine error: {0}")]
    Engine(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Session already active: {0}")]
    SessionActive(String),

    #[error("No active session: {0}")]
    NoSession(String),

    #[error("Timeline error: {0}")]
    Timeline(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Cutline operations.
pub type Result<T> = std::result::Result<T, CutlineError>;
