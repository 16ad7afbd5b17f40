use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrubError};

use super::ffmpeg::{run_ffmpeg, TRANSCODE_TIMEOUT};
use super::AudioBuffer;

/// Starting point for the bitrate search.
const INITIAL_BITRATE_KBPS: u32 = 128;

/// Encoder bitrate bounds.
const MIN_BITRATE_KBPS: u32 = 64;
const MAX_BITRATE_KBPS: u32 = 320;

/// Encoding attempts before accepting the last output as best effort.
const MAX_COMPRESS_ATTEMPTS: u32 = 3;

/// Result of the size-matching re-encode.
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub bitrate_kbps: u32,
    /// Whether the output landed within the size tolerance. Best-effort
    /// output is still delivered; matching the uploaded file's footprint is
    /// a nicety, not a correctness requirement.
    pub converged: bool,
}

/// Write a buffer as 16-bit interleaved PCM WAV.
pub fn write_wav(buf: &AudioBuffer, path: &Path) -> Result<()> {
    if buf.channels.is_empty() || buf.is_empty() {
        return Err(ScrubError::EncodeFailed(
            "Refusing to write empty audio buffer".to_string(),
        ));
    }

    let spec = WavSpec {
        channels: buf.channels.len() as u16,
        sample_rate: buf.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| ScrubError::EncodeFailed(format!("Failed to create WAV writer: {e}")))?;

    for i in 0..buf.len() {
        for channel in &buf.channels {
            let sample = (channel[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample)
                .map_err(|e| ScrubError::EncodeFailed(format!("Failed to write sample: {e}")))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| ScrubError::EncodeFailed(format!("Failed to finalize WAV: {e}")))?;

    debug!("Wrote {} frames to {}", buf.len(), path.display());
    Ok(())
}

/// Ratio-driven bitrate adjustment, clamped to the encoder's usable range.
fn next_bitrate(current: u32, target_bytes: u64, actual_bytes: u64) -> u32 {
    if actual_bytes == 0 {
        return current;
    }
    let ratio = target_bytes as f64 / actual_bytes as f64;
    ((current as f64 * ratio).floor() as u32).clamp(MIN_BITRATE_KBPS, MAX_BITRATE_KBPS)
}

/// Encode processed PCM to MP3, iteratively adjusting bitrate to land within
/// `tolerance` of `target_bytes`.
///
/// Never fails once encoding is available: if the loop exhausts its attempts
/// the last produced file is accepted as best effort.
pub async fn compress_to_target(
    buf: &AudioBuffer,
    target_bytes: u64,
    tolerance: f64,
    output: &Path,
    workdir: &Path,
) -> Result<CompressOutcome> {
    let pcm_path = workdir.join("redacted_pcm.wav");
    write_wav(buf, &pcm_path)?;

    let mut bitrate = INITIAL_BITRATE_KBPS;
    let mut last_size = 0u64;

    for attempt in 0..MAX_COMPRESS_ATTEMPTS {
        let args: Vec<std::ffi::OsString> = vec![
            "-i".into(),
            pcm_path.as_path().into(),
            "-vn".into(),
            "-codec:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            format!("{bitrate}k").into(),
            output.into(),
        ];
        run_ffmpeg(args, TRANSCODE_TIMEOUT).await.map_err(|e| match e {
            ScrubError::Timeout(d) => ScrubError::Timeout(d),
            other => ScrubError::EncodeFailed(other.to_string()),
        })?;

        last_size = std::fs::metadata(output)
            .map_err(|e| ScrubError::EncodeFailed(format!("Encoded file missing: {e}")))?
            .len();

        if target_bytes == 0 {
            // No size to match; single pass is the delivery
            return Ok(CompressOutcome {
                path: output.to_path_buf(),
                bytes: last_size,
                bitrate_kbps: bitrate,
                converged: false,
            });
        }

        let deviation =
            (last_size as f64 - target_bytes as f64).abs() / target_bytes as f64;
        debug!(
            "Compress attempt {}: {} bytes at {} kbps (target {}, deviation {:.1}%)",
            attempt + 1,
            last_size,
            bitrate,
            target_bytes,
            deviation * 100.0
        );

        if deviation < tolerance {
            info!(
                "Size matched in {} attempt(s): {} bytes at {} kbps",
                attempt + 1,
                last_size,
                bitrate
            );
            return Ok(CompressOutcome {
                path: output.to_path_buf(),
                bytes: last_size,
                bitrate_kbps: bitrate,
                converged: true,
            });
        }

        let adjusted = next_bitrate(bitrate, target_bytes, last_size);
        if adjusted == bitrate {
            // Pinned at a clamp bound; further attempts cannot move the size
            break;
        }
        bitrate = adjusted;
    }

    warn!(
        "Size matching did not converge; delivering best effort ({} bytes at {} kbps)",
        last_size, bitrate
    );
    Ok(CompressOutcome {
        path: output.to_path_buf(),
        bytes: last_size,
        bitrate_kbps: bitrate,
        converged: false,
    })
}
