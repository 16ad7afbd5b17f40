pub mod codec;
pub mod encode;
pub mod fallback;
pub mod ffmpeg;
pub mod redact;

pub use codec::{to_canonical_pcm, CanonicalAudio, ConversionProfile, DEFAULT_RETRY_BUDGET};
pub use encode::{compress_to_target, write_wav, CompressOutcome};
pub use fallback::{
    generate_beep_track, generate_silence, probe_duration_or_default, write_player_page,
    DEFAULT_FALLBACK_DURATION_SECS,
};
pub use ffmpeg::{check_ffmpeg, check_ffprobe, probe_duration};
pub use redact::apply_redactions;

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Decoded audio held in canonical planar form.
///
/// One sample vector per channel, all the same length, samples normalized to
/// [-1, 1]. The buffer is owned by exactly one pipeline stage at a time and
/// moves stage to stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Audio container formats the pipeline can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Unknown,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Unknown => "bin",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioFormat::Wav => write!(f, "wav"),
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identify the container from its leading bytes.
///
/// WAV is a RIFF chunk with a WAVE form type; MP3 either starts with an ID3v2
/// tag or directly with an MPEG audio frame sync (11 set bits). Extensions
/// are not consulted.
pub fn detect_format(bytes: &[u8]) -> AudioFormat {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return AudioFormat::Wav;
    }
    if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
        return AudioFormat::Mp3;
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        return AudioFormat::Mp3;
    }
    AudioFormat::Unknown
}

/// Identify a file's container by reading its first bytes.
pub fn detect_file_format(path: &Path) -> Result<AudioFormat> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 12];
    let n = file.read(&mut header)?;
    Ok(detect_format(&header[..n]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len_and_duration() {
        let buf = AudioBuffer::new(44100, vec![vec![0.0; 44100], vec![0.0; 44100]]);
        assert_eq!(buf.len(), 44100);
        assert!(!buf.is_empty());
        assert!((buf.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_buffer() {
        let buf = AudioBuffer::new(44100, vec![]);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.duration_secs(), 0.0);
    }

    #[test]
    fn test_detect_wav() {
        let mut header = Vec::new();
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&36u32.to_le_bytes());
        header.extend_from_slice(b"WAVE");
        assert_eq!(detect_format(&header), AudioFormat::Wav);
    }

    #[test]
    fn test_detect_mp3_id3() {
        assert_eq!(detect_format(b"ID3\x04\x00\x00\x00\x00\x00\x00"), AudioFormat::Mp3);
    }

    #[test]
    fn test_detect_mp3_frame_sync() {
        assert_eq!(detect_format(&[0xFF, 0xFB, 0x90, 0x00]), AudioFormat::Mp3);
        assert_eq!(detect_format(&[0xFF, 0xF3, 0x18, 0xC4]), AudioFormat::Mp3);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format(b"OggS\x00\x02"), AudioFormat::Unknown);
        assert_eq!(detect_format(b""), AudioFormat::Unknown);
        // RIFF without a WAVE form type (e.g. AVI) is not WAV
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00AVI "), AudioFormat::Unknown);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
    }
}
