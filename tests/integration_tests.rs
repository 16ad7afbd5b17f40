//! Integration tests for audioscrub
//!
//! These tests validate the integration between components without requiring
//! an external transcoder: WAV input exercises the direct decode path, and
//! the secure fallback is forced with undecodable input.

use audioscrub::audio::{detect_format, generate_silence, AudioFormat};
use audioscrub::audio::codec::read_wav;
use audioscrub::config::{ProcessingOptions, RedactionMethod};
use audioscrub::pipeline::{redact_recording, PipelineConfig, ProcessingResult};
use audioscrub::transcript::{
    detect, merge, DetectorConfig, MergeConfig, PatternKind, RawSpan, Word,
};

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

fn word(text: &str, start: f64, end: f64) -> Word {
    Word {
        text: text.to_string(),
        start,
        end,
        confidence: 1.0,
    }
}

fn span(start: f64, end: f64) -> RawSpan {
    RawSpan {
        start,
        end,
        kind: PatternKind::Ssn,
    }
}

/// Write a mono 16-bit WAV of constant non-zero amplitude.
fn write_constant_wav(path: &Path, sample_rate: u32, seconds: f64, amplitude: i16) {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f64 * seconds) as usize;
    for _ in 0..frames {
        writer.write_sample(amplitude).unwrap();
    }
    writer.finalize().unwrap();
}

// ============================================================================
// Span Detector Integration Tests
// ============================================================================

mod detector_tests {
    use super::*;

    #[test]
    fn test_no_matches_yields_empty() {
        let words: Vec<Word> = ["thanks", "for", "calling", "support", "today"]
            .iter()
            .enumerate()
            .map(|(i, t)| word(t, i as f64 * 0.5, (i + 1) as f64 * 0.5))
            .collect();

        let spans = detect(&words, PatternKind::all(), &DetectorConfig::default());
        assert!(spans.is_empty());
    }

    #[test]
    fn test_ssn_digit_groups_scenario() {
        // "123 45 6789" spanning 2.0-3.0s, SSN-shaped across a 3-word window
        let words = vec![
            word("ssn", 1.0, 1.4),
            word("is", 1.4, 2.0),
            word("123", 2.0, 2.3),
            word("45", 2.3, 2.6),
            word("6789", 2.6, 3.0),
        ];

        let spans = detect(&words, PatternKind::all(), &DetectorConfig::default());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, PatternKind::Ssn);
        // Covers roughly 2.0-3.0s plus clamped context
        assert!(spans[0].start <= 2.0);
        assert!(spans[0].end >= 3.0);
    }

    #[test]
    fn test_detector_to_merger_flow() {
        let mut words = vec![
            word("card", 0.0, 0.5),
            word("4111-1111-1111-1111", 0.5, 2.0),
        ];
        // Long silence, then a phone number
        words.push(word("call", 30.0, 30.4));
        words.push(word("me", 30.4, 30.8));
        words.push(word("at", 30.8, 31.2));
        words.push(word("555-867-5309", 31.2, 32.5));

        let spans = detect(&words, PatternKind::all(), &DetectorConfig::default());
        let intervals = merge(&spans, &MergeConfig::default());

        assert_eq!(intervals.len(), 2);
        assert!(intervals[0].end < intervals[1].start);
        // Each spoken value is fully inside an interval
        assert!(intervals[0].start <= 0.5 && intervals[0].end >= 2.0);
        assert!(intervals[1].start <= 31.2 && intervals[1].end >= 32.5);
    }
}

// ============================================================================
// Interval Merger Integration Tests
// ============================================================================

mod merger_tests {
    use super::*;

    #[test]
    fn test_small_gap_merges() {
        let intervals = merge(
            &[span(10.0, 12.0), span(12.5, 13.0)],
            &MergeConfig::default(),
        );
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 10.0).abs() < 1e-9);
        assert!((intervals[0].end - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_gap_stays_split() {
        let intervals = merge(
            &[span(10.0, 12.0), span(14.0, 15.0)],
            &MergeConfig::default(),
        );
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_output_sorted_disjoint_and_covering() {
        let spans = vec![
            span(9.0, 9.5),
            span(0.0, 1.0),
            span(5.0, 6.0),
            span(0.5, 2.0),
            span(20.0, 21.0),
        ];
        let intervals = merge(&spans, &MergeConfig::default());

        // Sorted ascending and pairwise disjoint beyond the merge gap
        for pair in intervals.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        // Every input span covered by some output interval
        for s in &spans {
            assert!(intervals
                .iter()
                .any(|iv| iv.start <= s.start && s.end <= iv.end));
        }
    }

    #[test]
    fn test_merge_idempotent() {
        use audioscrub::transcript::merge::merge_intervals;

        let cfg = MergeConfig::default();
        let once = merge(&[span(0.0, 1.0), span(1.5, 3.0), span(10.0, 12.0)], &cfg);
        let twice = merge_intervals(&once, &cfg);
        assert_eq!(once, twice);
    }
}

// ============================================================================
// End-to-End Pipeline Tests (direct WAV path)
// ============================================================================

mod pipeline_tests {
    use super::*;

    fn quiet_config(method: RedactionMethod) -> PipelineConfig {
        PipelineConfig {
            options: ProcessingOptions {
                method,
                ..Default::default()
            },
            show_progress: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_wav_mute_redaction_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        let output = dir.path().join("call_redacted.wav");
        write_constant_wav(&input, 44_100, 3.0, 8_000);

        // SSN spoken at 1.3-1.7s; with context padding and the 1s merge gap
        // the interval stays inside the 3s recording
        let words = vec![
            word("123-45-6789", 1.3, 1.7),
        ];

        let outcome = redact_recording(
            &input,
            &output,
            &words,
            &quiet_config(RedactionMethod::Mute),
        )
        .await
        .unwrap();

        assert!(matches!(outcome.result, ProcessingResult::Direct { .. }));
        assert_eq!(outcome.stats.intervals, 1);

        let buf = read_wav(&output).unwrap();
        assert_eq!(buf.sample_rate, 44_100);

        // The whole spoken value is silenced
        let mid = (1.5 * 44_100.0) as usize;
        assert_eq!(buf.channels[0][mid], 0.0);
        // Audio well before the interval is untouched (non-zero)
        assert!(buf.channels[0][0] != 0.0);
        let last = buf.len() - 1;
        assert!(buf.channels[0][last] != 0.0);
    }

    #[tokio::test]
    async fn test_wav_beep_redaction_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        let output = dir.path().join("call_redacted.wav");
        write_constant_wav(&input, 44_100, 3.0, 8_000);

        let words = vec![word("123-45-6789", 1.3, 1.7)];

        let mut config = quiet_config(RedactionMethod::Beep);
        config.options.beep_volume = 0.4;

        let outcome = redact_recording(&input, &output, &words, &config)
            .await
            .unwrap();
        let interval = outcome.intervals[0];

        let buf = read_wav(&output).unwrap();
        let start = (interval.start * 44_100.0) as usize;
        let end = (interval.end * 44_100.0) as usize;
        assert!(buf.channels[0][start..end]
            .iter()
            .all(|&s| s.abs() <= 0.4 + 1e-3));
        assert!(buf.channels[0][start..end].iter().any(|&s| s.abs() > 0.1));
    }

    #[tokio::test]
    async fn test_clean_transcript_passes_audio_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        let output = dir.path().join("call_redacted.wav");
        write_constant_wav(&input, 8_000, 1.0, 5_000);

        let words = vec![word("nothing", 0.0, 0.5), word("sensitive", 0.5, 1.0)];

        let outcome = redact_recording(
            &input,
            &output,
            &words,
            &quiet_config(RedactionMethod::Mute),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.intervals, 0);
        let buf = read_wav(&output).unwrap();
        assert!(buf.channels[0].iter().all(|&s| s != 0.0));
    }

    #[tokio::test]
    async fn test_undecodable_input_delivers_secure_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("corrupt.mp3");
        let output = dir.path().join("corrupt_redacted.mp3");

        // MP3 magic followed by garbage: both transcode profiles will fail
        // whether or not a transcoder is installed
        let mut original = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        original.extend(std::iter::repeat(0xABu8).take(4096));
        std::fs::write(&input, &original).unwrap();

        let words = vec![word("123-45-6789", 1.0, 2.0)];
        let mut config = quiet_config(RedactionMethod::Beep);
        config.retry_budget = 1;

        let outcome = redact_recording(&input, &output, &words, &config)
            .await
            .unwrap();

        let (beep_track_path, player_path) = match &outcome.result {
            ProcessingResult::Fallback {
                beep_track_path,
                player_path,
                ..
            } => (beep_track_path.clone(), player_path.clone()),
            other => panic!("Expected fallback, got {:?}", other.label()),
        };

        // The delivered file is never the original bytes
        let delivered = std::fs::read(&output).unwrap();
        assert_ne!(delivered, original);

        // And it decodes to silence across its full duration
        let buf = read_wav(&output).unwrap();
        assert!(buf.channels.iter().all(|c| c.iter().all(|&s| s == 0.0)));
        // Duration probe failed, so the default applies
        assert!(buf.duration_secs() >= 1.0);

        // Beep track carries the tone for the planned interval
        let beeps = read_wav(&beep_track_path).unwrap();
        assert!(beeps.channels[0].iter().any(|&s| s != 0.0));

        let html = std::fs::read_to_string(&player_path).unwrap();
        assert!(html.contains("corrupt.mp3"));
    }

    #[tokio::test]
    async fn test_missing_input_is_a_hard_error() {
        let config = quiet_config(RedactionMethod::Mute);
        let result = redact_recording(
            Path::new("/nonexistent/call.wav"),
            Path::new("/tmp/never.wav"),
            &[],
            &config,
        )
        .await;
        assert!(result.is_err());
    }
}

// ============================================================================
// Format Detection Tests
// ============================================================================

mod format_tests {
    use super::*;

    #[test]
    fn test_detects_real_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.wav");
        write_constant_wav(&path, 8_000, 0.1, 100);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(detect_format(&bytes), AudioFormat::Wav);
    }

    #[test]
    fn test_extension_is_not_trusted() {
        // WAV bytes behind an .mp3 name still detect as WAV
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mislabeled.mp3");
        write_constant_wav(&path, 8_000, 0.1, 100);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(detect_format(&bytes), AudioFormat::Wav);
    }

    #[test]
    fn test_mp3_and_unknown() {
        assert_eq!(detect_format(b"ID3\x03\x00\x00\x00\x00\x00\x00"), AudioFormat::Mp3);
        assert_eq!(detect_format(&[0xFF, 0xFB, 0x90, 0x44]), AudioFormat::Mp3);
        assert_eq!(detect_format(b"fLaC\x00\x00\x00\x22"), AudioFormat::Unknown);
    }
}

// ============================================================================
// Secure Fallback Unit-Level Tests
// ============================================================================

mod fallback_tests {
    use super::*;

    #[test]
    fn test_generated_silence_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        generate_silence(5.0, &path).unwrap();

        let buf = read_wav(&path).unwrap();
        assert!((buf.duration_secs() - 5.0).abs() < 0.01);
        for channel in &buf.channels {
            assert!(channel.iter().all(|&s| s == 0.0));
        }
    }
}
