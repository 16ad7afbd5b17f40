use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Invalid or unreadable audio: {0}")]
    DecodeInvalid(String),

    #[error("Audio conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Re-encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Secure fallback generation failed: {0}")]
    FallbackFailed(String),

    #[error("Transcoder timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrubError {
    /// Whether the orchestrator may still deliver a safe artifact for this
    /// error by routing through the secure fallback. `InputNotFound` and
    /// `FallbackFailed` are the only pipeline errors that propagate to the
    /// caller unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScrubError::DecodeInvalid(_)
                | ScrubError::ConversionFailed(_)
                | ScrubError::EncodeFailed(_)
                | ScrubError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScrubError>;
