//! Subprocess plumbing shared by the CLI-backed engines

use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use super::traits::ExtractionError;
use crate::humanize::HumanDuration;

const STDERR_TAIL_LINES: usize = 5;

/// Run `binary args...` to completion, killing it when `timeout` elapses
pub(crate) async fn run(
    engine: &str,
    binary: &str,
    args: &[String],
    timeout: HumanDuration,
) -> Result<Output, ExtractionError> {
    debug!(engine, binary, ?args, "Spawning engine process");

    let mut command = Command::new(binary);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let output = tokio::time::timeout(timeout.as_duration(), command.output())
        .await
        .map_err(|_| ExtractionError::Timeout {
            engine: engine.to_string(),
            timeout,
        })?
        .map_err(|source| ExtractionError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExtractionError::ProcessFailed {
            engine: engine.to_string(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(output)
}

/// `binary --version`, trimmed
pub(crate) async fn version(
    engine: &str,
    binary: &str,
    timeout: HumanDuration,
) -> Result<String, ExtractionError> {
    let output = run(engine, binary, &["--version".to_string()], timeout).await?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Last few non-empty stderr lines, enough to explain a failure in a job record
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
