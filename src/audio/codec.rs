use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use hound::WavReader;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrubError};

use super::ffmpeg::{check_ffmpeg, run_ffmpeg, TRANSCODE_TIMEOUT};
use super::{detect_file_format, AudioBuffer, AudioFormat};

/// Default number of full conversion attempts before giving up.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Fixed pause between conversion attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// One transcoder configuration in the conversion cascade.
#[derive(Debug, Clone)]
pub struct ConversionProfile {
    pub label: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
    /// Use the higher-quality soxr resampler.
    pub soxr_resampler: bool,
}

impl ConversionProfile {
    /// 16-bit PCM, 44.1 kHz, stereo.
    pub fn primary() -> Self {
        Self {
            label: "primary",
            sample_rate: 44_100,
            channels: 2,
            soxr_resampler: false,
        }
    }

    /// 16-bit PCM, 48 kHz, stereo, soxr resampler.
    pub fn secondary() -> Self {
        Self {
            label: "secondary",
            sample_rate: 48_000,
            channels: 2,
            soxr_resampler: true,
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.into(), "-vn".into()];
        if self.soxr_resampler {
            args.push("-af".into());
            args.push("aresample=resampler=soxr".into());
        }
        let codec: [OsString; 6] = [
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            self.sample_rate.to_string().into(),
            "-ac".into(),
            self.channels.to_string().into(),
        ];
        args.extend(codec);
        args.push(output.into());
        args
    }
}

/// Decode a 16-bit PCM WAV file into a planar buffer.
///
/// Other bit depths are rejected here; the transcoder cascade normalizes
/// them to 16-bit before this runs again on its output.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)
        .map_err(|e| ScrubError::DecodeInvalid(format!("Failed to open WAV file: {e}")))?;

    let spec = reader.spec();
    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        return Err(ScrubError::DecodeInvalid(
            "WAV file reports zero channels".to_string(),
        ));
    }

    debug!(
        "Decoding WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample != 16 {
                return Err(ScrubError::DecodeInvalid(format!(
                    "Unsupported WAV bit depth: {} (expected 16)",
                    spec.bits_per_sample
                )));
            }
            reader
                .into_samples::<i16>()
                .map(|s| {
                    s.map(|v| v as f32 / i16::MAX as f32)
                        .map_err(|e| ScrubError::DecodeInvalid(format!("Corrupt WAV sample: {e}")))
                })
                .collect::<Result<_>>()?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(|e| ScrubError::DecodeInvalid(format!("Corrupt WAV sample: {e}"))))
            .collect::<Result<_>>()?,
    };

    let frames = interleaved.len() / channel_count;
    let mut channels: Vec<Vec<f32>> = (0..channel_count)
        .map(|_| Vec::with_capacity(frames))
        .collect();
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % channel_count].push(sample);
    }

    Ok(AudioBuffer::new(spec.sample_rate, channels))
}

/// Verify a decoded buffer is usable: at least one channel with data.
fn verify(buf: &AudioBuffer, source: &Path) -> Result<()> {
    if buf.channels.is_empty() {
        return Err(ScrubError::DecodeInvalid(format!(
            "{} decoded to zero channels",
            source.display()
        )));
    }
    if buf.is_empty() {
        return Err(ScrubError::DecodeInvalid(format!(
            "{} decoded to empty channel data",
            source.display()
        )));
    }
    Ok(())
}

fn read_and_verify(path: &Path) -> Result<AudioBuffer> {
    let buf = read_wav(path)?;
    verify(&buf, path)?;
    Ok(buf)
}

/// Canonical PCM plus how it was obtained.
#[derive(Debug)]
pub struct CanonicalAudio {
    pub buffer: AudioBuffer,
    /// Whether the transcoder cascade ran (false = direct WAV decode).
    pub transcoded: bool,
}

/// Convert an input recording into canonical PCM.
///
/// WAV input is decoded directly and verified; any non-WAV input, or a WAV
/// whose direct decode fails, goes through the transcoder cascade: the
/// primary profile, then the secondary, each invocation bounded by
/// [`TRANSCODE_TIMEOUT`]. When both profiles fail the whole cascade is
/// retried after a fixed backoff, up to `retry_budget` attempts in total.
pub async fn to_canonical_pcm(
    input: &Path,
    workdir: &Path,
    retry_budget: u32,
) -> Result<CanonicalAudio> {
    if !input.exists() {
        return Err(ScrubError::InputNotFound(input.display().to_string()));
    }

    let format = detect_file_format(input)
        .map_err(|e| ScrubError::DecodeInvalid(format!("Cannot inspect {}: {e}", input.display())))?;
    debug!("Detected container: {format}");

    if format == AudioFormat::Wav {
        match read_and_verify(input) {
            Ok(buf) => {
                info!(
                    "Decoded WAV directly: {:.1}s, {} channels at {} Hz",
                    buf.duration_secs(),
                    buf.channels.len(),
                    buf.sample_rate
                );
                return Ok(CanonicalAudio {
                    buffer: buf,
                    transcoded: false,
                });
            }
            Err(e) => {
                warn!("Direct WAV decode failed ({e}), falling back to transcoder");
            }
        }
    }

    check_ffmpeg()?;

    let profiles = [ConversionProfile::primary(), ConversionProfile::secondary()];
    let mut last_error: Option<ScrubError> = None;

    for attempt in 0..retry_budget {
        if attempt > 0 {
            debug!("Conversion attempt {} after backoff", attempt + 1);
            tokio::time::sleep(RETRY_BACKOFF).await;
        }

        for profile in &profiles {
            let converted = workdir.join(format!("canonical_{}_{}.wav", attempt, profile.label));

            match run_ffmpeg(profile.args(input, &converted), TRANSCODE_TIMEOUT).await {
                Ok(()) => match read_and_verify(&converted) {
                    Ok(buf) => {
                        info!(
                            "Converted with {} profile: {:.1}s at {} Hz",
                            profile.label,
                            buf.duration_secs(),
                            buf.sample_rate
                        );
                        return Ok(CanonicalAudio {
                            buffer: buf,
                            transcoded: true,
                        });
                    }
                    Err(e) => {
                        warn!(
                            "Attempt {}: {} profile output failed verification: {e}",
                            attempt + 1,
                            profile.label
                        );
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    warn!(
                        "Attempt {}: {} profile conversion failed: {e}",
                        attempt + 1,
                        profile.label
                    );
                    last_error = Some(e);
                }
            }
        }
    }

    Err(ScrubError::ConversionFailed(format!(
        "Both profiles exhausted {} attempts on {}: {}",
        retry_budget,
        input.display(),
        last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
    )))
}
