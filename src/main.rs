use anyhow::{Context, Result};
use audioscrub::batch::{BatchRunner, RecordingJob};
use audioscrub::config::{Config, ProcessingOptions, RedactionMethod};
use audioscrub::pipeline::{print_summary, redact_recording, PipelineConfig};
use audioscrub::stt::{Transcriber, WhisperClient};
use audioscrub::transcript::{PatternKind, Transcript};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audioscrub")]
#[command(version, about = "Sensitive-content audio redaction for call recordings")]
#[command(
    long_about = "Locate SSNs, card numbers, phone numbers and bank details in a call \
recording's transcript and destroy the audio covering them with a tone or silence."
)]
struct Cli {
    /// Input call recordings (MP3 or WAV)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Word-level transcript JSON (single input; batches derive <stem>.words.json)
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Transcribe inputs via the Whisper API instead of reading transcript files
    #[arg(long)]
    transcribe: bool,

    /// Output file (single input; defaults to <stem>_redacted.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Redaction method: beep, mute
    #[arg(short, long, default_value = "beep")]
    method: String,

    /// Beep tone volume in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    beep_volume: f64,

    /// Gain applied to the whole recording before redaction
    #[arg(long, default_value_t = 1.0)]
    volume: f64,

    /// Comma-separated pattern kinds to detect (default: all)
    #[arg(short, long)]
    patterns: Option<String>,

    /// Number of concurrent jobs in batch mode
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Delivery extension mirrors the input container: WAV stays WAV, anything
/// else is delivered as MP3.
fn derive_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = match input.extension().and_then(|e| e.to_str()) {
        Some("wav") | Some("WAV") => "wav",
        _ => "mp3",
    };
    input.with_file_name(format!("{stem}_redacted.{ext}"))
}

fn derive_transcript_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}.words.json"))
}

fn parse_patterns(spec: Option<&str>) -> Result<Vec<PatternKind>> {
    match spec {
        None => Ok(PatternKind::all().to_vec()),
        Some(spec) => spec
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<PatternKind>()
                    .map_err(|e| anyhow::anyhow!(e))
            })
            .collect(),
    }
}

async fn load_transcript(
    input: &Path,
    explicit: Option<&Path>,
    transcriber: Option<&WhisperClient>,
) -> Result<Transcript> {
    if let Some(client) = transcriber {
        info!("Transcribing {} via {}", input.display(), client.name());
        return client
            .transcribe(input)
            .await
            .with_context(|| format!("Transcription failed for {}", input.display()));
    }

    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_transcript_path(input));
    Transcript::load(&path)
        .with_context(|| format!("Failed to load transcript {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    if cli.inputs.len() > 1 && cli.output.is_some() {
        anyhow::bail!("--output only applies to a single input; batches derive output names");
    }
    if cli.inputs.len() > 1 && cli.transcript.is_some() {
        anyhow::bail!("--transcript only applies to a single input");
    }

    let method: RedactionMethod = cli.method.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let patterns = parse_patterns(cli.patterns.as_deref())?;

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let transcriber = if cli.transcribe {
        let api_key = config.require_api_key()?.to_string();
        Some(WhisperClient::new(api_key))
    } else {
        None
    };

    let options = ProcessingOptions {
        method,
        beep_volume: cli.beep_volume,
        audio_volume: cli.volume,
        ..Default::default()
    };
    options.validate().context("Invalid processing options")?;

    let pipeline_config = PipelineConfig {
        options,
        patterns,
        ..Default::default()
    };

    info!("Method:   {}", method);
    info!("Patterns: {}", pipeline_config.patterns.len());

    if cli.inputs.len() == 1 {
        let input = &cli.inputs[0];
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| derive_output_path(input));

        let transcript =
            load_transcript(input, cli.transcript.as_deref(), transcriber.as_ref()).await?;

        info!("Input:    {}", input.display());
        info!("Output:   {}", output.display());

        let outcome = redact_recording(input, &output, &transcript.words, &pipeline_config)
            .await
            .with_context(|| format!("Redaction failed for {}", input.display()))?;

        print_summary(&outcome);
        return Ok(());
    }

    // Batch mode
    let mut jobs = Vec::with_capacity(cli.inputs.len());
    for (index, input) in cli.inputs.iter().enumerate() {
        let transcript = load_transcript(input, None, transcriber.as_ref()).await?;
        jobs.push(RecordingJob {
            index,
            input: input.clone(),
            output: derive_output_path(input),
            transcript,
        });
    }

    let concurrency = cli.concurrency.unwrap_or(config.concurrency);
    let runner = BatchRunner::new(pipeline_config, concurrency);
    let (reports, stats) = runner.process(jobs).await;

    println!();
    for report in &reports {
        match (&report.outcome, &report.error) {
            (Some(outcome), _) => println!(
                "  {} -> {} ({}, {} interval(s))",
                report.input.display(),
                outcome.result.path().display(),
                outcome.result.label(),
                outcome.stats.intervals,
            ),
            (None, Some(error)) => println!("  {} FAILED: {}", report.input.display(), error),
            (None, None) => println!("  {} FAILED", report.input.display()),
        }
    }
    println!();
    println!(
        "{} of {} redacted ({} fallback(s), {} failed) in {:.2}s",
        stats.succeeded + stats.fallbacks,
        stats.total_jobs,
        stats.fallbacks,
        stats.failed,
        stats.total_time.as_secs_f64()
    );

    if stats.failed > 0 {
        warn!("{} recording(s) could not be safely redacted", stats.failed);
        std::process::exit(1);
    }

    Ok(())
}
