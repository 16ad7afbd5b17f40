pub mod whisper;

pub use whisper::WhisperClient;

use crate::error::Result;
use crate::transcript::Transcript;
use async_trait::async_trait;
use std::path::Path;

/// The transcription boundary: a function that returns words with
/// timestamps. The redaction engine itself never talks to a speech service;
/// it consumes whatever word stream an implementation of this trait (or a
/// pre-computed transcript file) provides.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a complete recording into a word-level transcript.
    async fn transcribe(&self, audio: &Path) -> Result<Transcript>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Largest file the provider accepts, in bytes.
    fn max_file_size(&self) -> usize;
}
