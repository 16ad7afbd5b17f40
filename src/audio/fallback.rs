use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{info, warn};

use crate::error::{Result, ScrubError};
use crate::transcript::RedactionInterval;

use super::ffmpeg::probe_duration;
use super::redact::tone_sample;

/// Used when the original's duration cannot be probed.
pub const DEFAULT_FALLBACK_DURATION_SECS: f64 = 60.0;

const FALLBACK_SAMPLE_RATE: u32 = 44_100;
const FALLBACK_CHANNELS: u16 = 2;

/// Best-effort duration of the original recording.
pub fn probe_duration_or_default(input: &Path) -> f64 {
    match probe_duration(input) {
        Ok(secs) if secs.is_finite() && secs > 0.0 => secs,
        Ok(secs) => {
            warn!("Probed nonsensical duration {secs}; using default");
            DEFAULT_FALLBACK_DURATION_SECS
        }
        Err(e) => {
            warn!("Duration probe failed ({e}); using default");
            DEFAULT_FALLBACK_DURATION_SECS
        }
    }
}

fn fallback_spec() -> WavSpec {
    WavSpec {
        channels: FALLBACK_CHANNELS,
        sample_rate: FALLBACK_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write a provably silent stereo file of the given duration.
///
/// Written in-process rather than via the transcoder: the dominant reason
/// this runs at all is a failing transcoder, and the fail-safe must not
/// depend on it. Every error maps to `FallbackFailed`, which is fatal for
/// the job; no further fallback (and in particular no copy of the source)
/// exists below this.
pub fn generate_silence(duration_secs: f64, path: &Path) -> Result<()> {
    let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        DEFAULT_FALLBACK_DURATION_SECS
    };

    let frames = (duration * FALLBACK_SAMPLE_RATE as f64) as usize;
    let mut writer = WavWriter::create(path, fallback_spec())
        .map_err(|e| ScrubError::FallbackFailed(format!("Cannot create silence file: {e}")))?;

    for _ in 0..frames {
        for _ in 0..FALLBACK_CHANNELS {
            writer
                .write_sample(0i16)
                .map_err(|e| ScrubError::FallbackFailed(format!("Cannot write silence: {e}")))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| ScrubError::FallbackFailed(format!("Cannot finalize silence file: {e}")))?;

    info!(
        "Generated {:.1}s of silence at {}",
        duration,
        path.display()
    );
    Ok(())
}

/// Write a standalone beep track: silence everywhere, a 1 kHz tone inside
/// each redaction interval. Paired with the original by the player page when
/// source-format redaction failed.
pub fn generate_beep_track(
    duration_secs: f64,
    intervals: &[RedactionInterval],
    beep_volume: f64,
    path: &Path,
) -> Result<()> {
    let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        DEFAULT_FALLBACK_DURATION_SECS
    };

    let rate = FALLBACK_SAMPLE_RATE as f64;
    let frames = (duration * rate) as usize;

    let mut ranges: Vec<(usize, usize)> = intervals
        .iter()
        .map(|iv| {
            let start = ((iv.start * rate).floor() as i64).clamp(0, frames as i64) as usize;
            let end = ((iv.end * rate).floor() as i64).clamp(0, frames as i64) as usize;
            (start, end)
        })
        .filter(|(s, e)| s < e)
        .collect();
    ranges.sort_unstable();

    let mut writer = WavWriter::create(path, fallback_spec())
        .map_err(|e| ScrubError::FallbackFailed(format!("Cannot create beep track: {e}")))?;

    let mut range_idx = 0;
    for i in 0..frames {
        while range_idx < ranges.len() && i >= ranges[range_idx].1 {
            range_idx += 1;
        }
        let in_beep = range_idx < ranges.len()
            && i >= ranges[range_idx].0
            && i < ranges[range_idx].1;

        let sample = if in_beep {
            let tone = tone_sample(i - ranges[range_idx].0, rate, beep_volume);
            (tone.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        } else {
            0i16
        };

        for _ in 0..FALLBACK_CHANNELS {
            writer
                .write_sample(sample)
                .map_err(|e| ScrubError::FallbackFailed(format!("Cannot write beep track: {e}")))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| ScrubError::FallbackFailed(format!("Cannot finalize beep track: {e}")))?;

    info!(
        "Generated beep track with {} tone range(s) at {}",
        ranges.len(),
        path.display()
    );
    Ok(())
}

/// Write the playback-pairing descriptor: a minimal page that plays the
/// original recording alongside the beep track.
pub fn write_player_page(
    original_name: &str,
    beep_track_name: &str,
    path: &Path,
) -> Result<()> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Paired redaction playback</title></head>
<body>
<h1>Paired redaction playback</h1>
<p>Direct redaction of this recording failed. Play both tracks together so
the beep track masks sensitive content in the original.</p>
<p>Original: <audio id="original" controls src="{original_name}"></audio></p>
<p>Beep track: <audio id="beeps" controls src="{beep_track_name}"></audio></p>
<button onclick="document.getElementById('original').play(); document.getElementById('beeps').play();">
Play both
</button>
</body>
</html>
"#
    );

    std::fs::write(path, html)
        .map_err(|e| ScrubError::FallbackFailed(format!("Cannot write player page: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::read_wav;

    #[test]
    fn test_silence_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        generate_silence(2.0, &path).unwrap();

        let buf = read_wav(&path).unwrap();
        assert_eq!(buf.channels.len(), 2);
        assert!((buf.duration_secs() - 2.0).abs() < 0.01);
        for channel in &buf.channels {
            assert!(channel.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_silence_bad_duration_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        generate_silence(f64::NAN, &path).unwrap();

        let buf = read_wav(&path).unwrap();
        assert!((buf.duration_secs() - DEFAULT_FALLBACK_DURATION_SECS).abs() < 0.01);
    }

    #[test]
    fn test_silence_unwritable_path_fails() {
        let result = generate_silence(1.0, Path::new("/nonexistent/dir/silence.wav"));
        assert!(matches!(result, Err(ScrubError::FallbackFailed(_))));
    }

    #[test]
    fn test_beep_track_tone_only_inside_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beeps.wav");
        let intervals = [RedactionInterval { start: 1.0, end: 2.0 }];
        generate_beep_track(3.0, &intervals, 0.5, &path).unwrap();

        let buf = read_wav(&path).unwrap();
        let rate = buf.sample_rate as usize;
        let channel = &buf.channels[0];

        assert!(channel[..rate].iter().all(|&s| s == 0.0));
        assert!(channel[2 * rate..].iter().all(|&s| s == 0.0));
        // Tone present and bounded inside the interval
        assert!(channel[rate..2 * rate].iter().any(|&s| s.abs() > 0.1));
        assert!(channel[rate..2 * rate].iter().all(|&s| s.abs() <= 0.5 + 1e-3));
    }

    #[test]
    fn test_beep_track_no_intervals_is_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beeps.wav");
        generate_beep_track(1.0, &[], 0.5, &path).unwrap();

        let buf = read_wav(&path).unwrap();
        assert!(buf.channels[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_player_page_references_both_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.html");
        write_player_page("call.mp3", "call_beeps.wav", &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("call.mp3"));
        assert!(html.contains("call_beeps.wav"));
        assert!(html.contains("<audio"));
    }
}
