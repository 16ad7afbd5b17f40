use crate::pipeline::{redact_recording, JobOutcome, PipelineConfig};
use crate::transcript::Transcript;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One recording queued for redaction.
#[derive(Debug, Clone)]
pub struct RecordingJob {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub transcript: Transcript,
}

/// Outcome of a single batch entry. Failures are recorded here rather than
/// aborting the rest of the batch.
#[derive(Debug)]
pub struct JobReport {
    pub index: usize,
    pub input: PathBuf,
    pub outcome: Option<JobOutcome>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Aggregate statistics for a batch.
#[derive(Debug, Clone)]
pub struct BatchStats {
    pub total_jobs: usize,
    pub succeeded: usize,
    pub fallbacks: usize,
    pub failed: usize,
    pub total_time: Duration,
}

/// Runs many redaction jobs with bounded concurrency.
///
/// Jobs share no mutable state; each gets its own temp directory from the
/// pipeline, so nothing here needs locking beyond the admission semaphore.
pub struct BatchRunner {
    config: Arc<PipelineConfig>,
    concurrency: usize,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(config: PipelineConfig, concurrency: usize) -> Self {
        // Per-job spinners would interleave; the batch bar is the display
        let mut config = config;
        config.show_progress = false;
        Self {
            config: Arc::new(config),
            concurrency: concurrency.max(1),
            show_progress: true,
        }
    }

    /// Enable or disable the batch progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process all jobs concurrently and return per-job reports in input
    /// order.
    pub async fn process(&self, jobs: Vec<RecordingJob>) -> (Vec<JobReport>, BatchStats) {
        let total_jobs = jobs.len();
        let start_time = Instant::now();

        if total_jobs == 0 {
            return (
                Vec::new(),
                BatchStats {
                    total_jobs: 0,
                    succeeded: 0,
                    fallbacks: 0,
                    failed: 0,
                    total_time: Duration::ZERO,
                },
            );
        }

        info!(
            "Processing {} recording(s) with {} concurrent job(s)",
            total_jobs, self.concurrency
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total_jobs as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} recordings ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for job in jobs {
            let sem = semaphore.clone();
            let config = self.config.clone();
            let pb = progress_bar.clone();

            futures.push(async move {
                let _permit = sem.acquire().await.expect("Semaphore closed");

                let job_start = Instant::now();
                debug!("Starting redaction of {:?}", job.input);

                let result = redact_recording(
                    &job.input,
                    &job.output,
                    &job.transcript.words,
                    &config,
                )
                .await;
                let duration_ms = job_start.elapsed().as_millis() as u64;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                match result {
                    Ok(outcome) => {
                        debug!(
                            "Job {} completed ({}) in {}ms",
                            job.index,
                            outcome.result.label(),
                            duration_ms
                        );
                        JobReport {
                            index: job.index,
                            input: job.input,
                            outcome: Some(outcome),
                            error: None,
                            duration_ms,
                        }
                    }
                    Err(e) => {
                        warn!("Job {} failed: {}", job.index, e);
                        JobReport {
                            index: job.index,
                            input: job.input,
                            outcome: None,
                            error: Some(e.to_string()),
                            duration_ms,
                        }
                    }
                }
            });
        }

        let mut reports: Vec<JobReport> = Vec::with_capacity(total_jobs);
        while let Some(report) = futures.next().await {
            reports.push(report);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("done");
        }

        reports.sort_by_key(|r| r.index);

        let succeeded = reports
            .iter()
            .filter(|r| matches!(&r.outcome, Some(o) if !o.result.is_fallback()))
            .count();
        let fallbacks = reports
            .iter()
            .filter(|r| matches!(&r.outcome, Some(o) if o.result.is_fallback()))
            .count();
        let failed = reports.iter().filter(|r| r.outcome.is_none()).count();

        let stats = BatchStats {
            total_jobs,
            succeeded,
            fallbacks,
            failed,
            total_time: start_time.elapsed(),
        };

        info!(
            "Batch complete: {} succeeded, {} fallback(s), {} failed in {:.2}s",
            stats.succeeded,
            stats.fallbacks,
            stats.failed,
            stats.total_time.as_secs_f64()
        );

        (reports, stats)
    }
}
