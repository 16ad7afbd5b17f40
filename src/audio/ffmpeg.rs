use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, ScrubError};

/// Hard wall-clock budget for a single transcoder invocation. A run that
/// exceeds it is killed and counted as a failed attempt; no partial output
/// is accepted.
pub const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            ScrubError::ConversionFailed(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ScrubError::ConversionFailed(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = std::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            ScrubError::ConversionFailed(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ScrubError::ConversionFailed(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Get a recording's duration in seconds using FFprobe.
pub fn probe_duration(input: &Path) -> Result<f64> {
    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| ScrubError::DecodeInvalid(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScrubError::DecodeInvalid(format!(
            "FFprobe failed: {stderr}"
        )));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str.trim().parse().map_err(|e| {
        ScrubError::DecodeInvalid(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })
}

/// Run one FFmpeg invocation with an explicit argument list and wall-clock
/// budget.
///
/// Stderr is captured for failure diagnostics only; the exit code is the
/// sole control signal. On timeout the subprocess is killed and
/// [`ScrubError::Timeout`] is returned.
pub async fn run_ffmpeg<I, S>(args: I, time_budget: Duration) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = tokio::process::Command::new("ffmpeg")
        .arg("-y")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ScrubError::ConversionFailed(format!("Failed to spawn FFmpeg: {e}")))?;

    // wait_with_output drains stderr while waiting, so a chatty transcoder
    // cannot deadlock on a full pipe. Dropping the future on timeout kills
    // the child (kill_on_drop).
    let output = match tokio::time::timeout(time_budget, child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|e| ScrubError::ConversionFailed(format!("Failed to wait for FFmpeg: {e}")))?,
        Err(_) => {
            warn!("FFmpeg exceeded {:?} budget, killing", time_budget);
            return Err(ScrubError::Timeout(time_budget));
        }
    };

    if !output.status.success() {
        let diagnostics = String::from_utf8_lossy(&output.stderr);
        return Err(ScrubError::ConversionFailed(format!(
            "FFmpeg exited with {}: {}",
            output.status,
            stderr_tail(&diagnostics)
        )));
    }

    Ok(())
}

/// Last few lines of transcoder stderr, enough to diagnose without flooding
/// logs.
fn stderr_tail(diagnostics: &str) -> String {
    const MAX_LINES: usize = 5;
    let lines: Vec<&str> = diagnostics.lines().rev().take(MAX_LINES).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
}
