use crate::audio::{
    apply_redactions, compress_to_target, detect_file_format, generate_beep_track,
    generate_silence, probe_duration_or_default, to_canonical_pcm, write_player_page, write_wav,
    AudioFormat, DEFAULT_RETRY_BUDGET,
};
use crate::config::ProcessingOptions;
use crate::error::{Result, ScrubError};
use crate::transcript::{
    detect, merge, DetectorConfig, MergeConfig, PatternKind, RedactionInterval, Word,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Configuration for one redaction job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Redaction method and volumes.
    pub options: ProcessingOptions,
    /// Pattern kinds to detect.
    pub patterns: Vec<PatternKind>,
    /// Detection tuning (context padding, window sizes).
    pub detector: DetectorConfig,
    /// Interval merge tuning.
    pub merge: MergeConfig,
    /// Full conversion attempts before the job falls back.
    pub retry_budget: u32,
    /// Show progress spinners.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            options: ProcessingOptions::default(),
            patterns: PatternKind::all().to_vec(),
            detector: DetectorConfig::default(),
            merge: MergeConfig::default(),
            retry_budget: DEFAULT_RETRY_BUDGET,
            show_progress: true,
        }
    }
}

/// How a finished job delivered its artifact.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    /// WAV in, redacted WAV out; no transcoding was needed.
    Direct { path: PathBuf, format: AudioFormat },
    /// Transcoded delivery without a size match (best effort or no target).
    Converted { path: PathBuf, format: AudioFormat },
    /// Transcoded delivery, size-matched to the original within tolerance.
    Compressed { path: PathBuf, format: AudioFormat },
    /// Direct redaction failed; delivery is provably silent, paired with a
    /// standalone beep track and a playback page.
    Fallback {
        path: PathBuf,
        beep_track_path: PathBuf,
        player_path: PathBuf,
    },
}

impl ProcessingResult {
    pub fn path(&self) -> &Path {
        match self {
            ProcessingResult::Direct { path, .. }
            | ProcessingResult::Converted { path, .. }
            | ProcessingResult::Compressed { path, .. }
            | ProcessingResult::Fallback { path, .. } => path,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ProcessingResult::Fallback { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessingResult::Direct { .. } => "direct",
            ProcessingResult::Converted { .. } => "converted",
            ProcessingResult::Compressed { .. } => "compressed",
            ProcessingResult::Fallback { .. } => "fallback",
        }
    }
}

/// Timing and coverage statistics for one job.
#[derive(Debug, Clone)]
pub struct RedactionStats {
    pub total_time: Duration,
    pub convert_time: Duration,
    pub redact_time: Duration,
    pub encode_time: Duration,
    pub words_scanned: usize,
    pub intervals: usize,
    pub audio_duration: Duration,
}

/// Result of one redaction job.
#[derive(Debug)]
pub struct JobOutcome {
    pub result: ProcessingResult,
    pub stats: RedactionStats,
    pub intervals: Vec<RedactionInterval>,
}

fn stage_spinner(mp: Option<&MultiProgress>, message: &str) -> Option<ProgressBar> {
    mp.map(|mp| {
        let pb = mp.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    })
}

/// Redact one recording.
///
/// Sequences Detect → Convert → Redact → Reencode. A Convert/Redact/Reencode
/// failure does not surface to the caller: the job routes to the secure
/// fallback and still returns normally, with the degraded outcome visible in
/// the result variant. Only a missing input or a fallback that itself fails
/// produce an `Err`; under no path is the original audio ever delivered.
///
/// All intermediate files live in a job-private temp directory removed on
/// every exit path, so un-redacted PCM never outlives the job and concurrent
/// jobs cannot collide.
pub async fn redact_recording(
    input: &Path,
    output: &Path,
    words: &[Word],
    config: &PipelineConfig,
) -> Result<JobOutcome> {
    let start_time = Instant::now();

    config.options.validate()?;

    if !input.exists() {
        return Err(ScrubError::InputNotFound(input.display().to_string()));
    }

    let multi_progress = if config.show_progress {
        Some(MultiProgress::new())
    } else {
        None
    };

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Sensitive-span detection
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 1/4: Scanning {} words for sensitive content", words.len());

    let spans = detect(words, &config.patterns, &config.detector);
    let intervals = merge(&spans, &config.merge);

    if intervals.is_empty() {
        info!("No sensitive content detected; audio passes through unmodified ranges only");
    } else {
        info!(
            "Found {} span(s), merged into {} redaction interval(s)",
            spans.len(),
            intervals.len()
        );
    }

    let temp_dir = TempDir::with_prefix("audioscrub-")?;
    debug!("Using temp directory: {:?}", temp_dir.path());

    let staged = run_stages(
        input,
        output,
        &intervals,
        config,
        temp_dir.path(),
        multi_progress.as_ref(),
    )
    .await;

    let (result, convert_time, redact_time, encode_time, audio_duration) = match staged {
        Ok(ok) => ok,
        Err(e) if e.is_recoverable() => {
            warn!("Redaction stage failed ({e}); generating secure fallback");
            let result = run_secure_fallback(input, output, &intervals, &config.options)?;
            (result, Duration::ZERO, Duration::ZERO, Duration::ZERO, Duration::ZERO)
        }
        Err(e) => return Err(e),
    };

    // Dropping temp_dir here (and on every early return above) removes all
    // intermediate PCM from disk.
    drop(temp_dir);

    let stats = RedactionStats {
        total_time: start_time.elapsed(),
        convert_time,
        redact_time,
        encode_time,
        words_scanned: words.len(),
        intervals: intervals.len(),
        audio_duration,
    };

    info!(
        "Job finished ({}): {} in {:.2}s",
        result.label(),
        result.path().display(),
        stats.total_time.as_secs_f64()
    );

    Ok(JobOutcome {
        result,
        stats,
        intervals,
    })
}

/// The fallible middle of the pipeline: Convert → Redact → Reencode.
async fn run_stages(
    input: &Path,
    output: &Path,
    intervals: &[RedactionInterval],
    config: &PipelineConfig,
    temp_path: &Path,
    multi_progress: Option<&MultiProgress>,
) -> Result<(ProcessingResult, Duration, Duration, Duration, Duration)> {
    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Conversion to canonical PCM
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 2/4: Converting {:?} to canonical PCM", input);
    let convert_start = Instant::now();
    let pb = stage_spinner(multi_progress, "Converting audio...");

    let input_format = detect_file_format(input).unwrap_or(AudioFormat::Unknown);
    let original_size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);

    let canonical = to_canonical_pcm(input, temp_path, config.retry_budget).await?;
    let transcoded = canonical.transcoded;
    let buf = canonical.buffer;
    let audio_duration = Duration::from_secs_f64(buf.duration_secs());

    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "✓ Audio decoded ({:.1}s)",
            audio_duration.as_secs_f64()
        ));
    }
    let convert_time = convert_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Sample redaction
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "Stage 3/4: Destroying {} interval(s) with {}",
        intervals.len(),
        config.options.method
    );
    let redact_start = Instant::now();

    let buf = apply_redactions(buf, intervals, &config.options);

    let redact_time = redact_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 4: Delivery encoding
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 4/4: Encoding delivery file");
    let encode_start = Instant::now();
    let pb = stage_spinner(multi_progress, "Encoding delivery file...");

    let result = if input_format == AudioFormat::Wav {
        write_wav(&buf, output)?;
        if transcoded {
            // The WAV needed the transcoder cascade; delivery format still
            // matches the input, but this was not a direct decode
            ProcessingResult::Converted {
                path: output.to_path_buf(),
                format: AudioFormat::Wav,
            }
        } else {
            ProcessingResult::Direct {
                path: output.to_path_buf(),
                format: AudioFormat::Wav,
            }
        }
    } else {
        let outcome = compress_to_target(
            &buf,
            original_size,
            config.options.size_tolerance,
            output,
            temp_path,
        )
        .await?;
        if outcome.converged {
            ProcessingResult::Compressed {
                path: outcome.path,
                format: AudioFormat::Mp3,
            }
        } else {
            ProcessingResult::Converted {
                path: outcome.path,
                format: AudioFormat::Mp3,
            }
        }
    };

    if let Some(pb) = pb {
        pb.finish_with_message(format!("✓ Delivered {} ({})", result.path().display(), result.label()));
    }
    let encode_time = encode_start.elapsed();

    Ok((result, convert_time, redact_time, encode_time, audio_duration))
}

/// Produce the fail-safe delivery after an irrecoverable stage failure.
///
/// The delivery path receives provably silent audio matching the original's
/// probed duration; a standalone beep track and a playback-pairing page sit
/// beside it. Errors here are `FallbackFailed` and fatal for the job.
fn run_secure_fallback(
    input: &Path,
    output: &Path,
    intervals: &[RedactionInterval],
    options: &ProcessingOptions,
) -> Result<ProcessingResult> {
    let duration = probe_duration_or_default(input);

    generate_silence(duration, output)?;

    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let beep_track_path = output.with_file_name(format!("{stem}_beeps.wav"));
    let player_path = output.with_file_name(format!("{stem}_player.html"));

    generate_beep_track(duration, intervals, options.beep_volume, &beep_track_path)?;

    let original_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "original".to_string());
    let beep_name = beep_track_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_player_page(&original_name, &beep_name, &player_path)?;

    warn!(
        "Delivered secure fallback for {}: silence at {}, beep track at {}",
        input.display(),
        output.display(),
        beep_track_path.display()
    );

    Ok(ProcessingResult::Fallback {
        path: output.to_path_buf(),
        beep_track_path,
        player_path,
    })
}

/// Print a summary of the job results.
pub fn print_summary(outcome: &JobOutcome) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Redaction Complete                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:      {}", outcome.result.path().display());
    println!("  Delivery:    {}", outcome.result.label());
    println!("  Words:       {}", outcome.stats.words_scanned);
    println!("  Intervals:   {}", outcome.stats.intervals);
    if outcome.stats.audio_duration > Duration::ZERO {
        println!(
            "  Duration:    {:.1}s audio",
            outcome.stats.audio_duration.as_secs_f64()
        );
    }
    println!();
    println!("  Timing:");
    println!(
        "    Convert:   {:.2}s",
        outcome.stats.convert_time.as_secs_f64()
    );
    println!(
        "    Redact:    {:.2}s",
        outcome.stats.redact_time.as_secs_f64()
    );
    println!(
        "    Encode:    {:.2}s",
        outcome.stats.encode_time.as_secs_f64()
    );
    println!(
        "    Total:     {:.2}s",
        outcome.stats.total_time.as_secs_f64()
    );
    if outcome.result.is_fallback() {
        println!();
        println!("  Note: direct redaction failed; delivered silence plus a");
        println!("  paired beep track. Treat this recording as lower confidence.");
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedactionMethod;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.options.method, RedactionMethod::Beep);
        assert_eq!(config.patterns.len(), 5);
        assert_eq!(config.retry_budget, DEFAULT_RETRY_BUDGET);
        assert!(config.show_progress);
    }

    #[test]
    fn test_processing_result_accessors() {
        let direct = ProcessingResult::Direct {
            path: PathBuf::from("/tmp/out.wav"),
            format: AudioFormat::Wav,
        };
        assert_eq!(direct.label(), "direct");
        assert!(!direct.is_fallback());
        assert_eq!(direct.path(), Path::new("/tmp/out.wav"));

        let fallback = ProcessingResult::Fallback {
            path: PathBuf::from("/tmp/out.wav"),
            beep_track_path: PathBuf::from("/tmp/out_beeps.wav"),
            player_path: PathBuf::from("/tmp/out_player.html"),
        };
        assert_eq!(fallback.label(), "fallback");
        assert!(fallback.is_fallback());
    }

    #[tokio::test]
    async fn test_missing_input_propagates() {
        let config = PipelineConfig {
            show_progress: false,
            ..Default::default()
        };
        let result = redact_recording(
            Path::new("/nonexistent/call.mp3"),
            Path::new("/tmp/out.mp3"),
            &[],
            &config,
        )
        .await;
        assert!(matches!(result, Err(ScrubError::InputNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let mut config = PipelineConfig {
            show_progress: false,
            ..Default::default()
        };
        config.options.beep_volume = 7.0;
        let result = redact_recording(
            Path::new("/nonexistent/call.mp3"),
            Path::new("/tmp/out.mp3"),
            &[],
            &config,
        )
        .await;
        assert!(matches!(result, Err(ScrubError::Config(_))));
    }
}
