pub mod detect;
pub mod merge;

pub use detect::{detect, DetectorConfig, PatternKind, RawSpan};
pub use merge::{merge, MergeConfig, RedactionInterval};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrubError};

/// A single transcribed word with its position in the audio.
///
/// Produced by the transcription collaborator and never mutated afterwards;
/// ordering within a [`Transcript`] is chronological and significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// Start time in seconds from the beginning of the recording.
    pub start: f64,
    /// End time in seconds; always >= `start`.
    pub end: f64,
    /// Recognizer confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// A word-level transcript of one recording.
///
/// The redaction engine only consumes `words`; the flat `text` rendering is
/// carried for callers that persist or display it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub words: Vec<Word>,
    #[serde(default)]
    pub text: String,
}

impl Transcript {
    pub fn new(words: Vec<Word>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { words, text }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Load a transcript from a JSON file.
    ///
    /// Accepts either a bare array of words or an object `{words, text}`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScrubError::InputNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;

        if let Ok(transcript) = serde_json::from_str::<Transcript>(&contents) {
            return Ok(transcript);
        }
        let words: Vec<Word> = serde_json::from_str(&contents).map_err(|e| {
            ScrubError::Transcription(format!(
                "Failed to parse transcript {}: {e}",
                path.display()
            ))
        })?;
        Ok(Transcript::new(words))
    }
}
