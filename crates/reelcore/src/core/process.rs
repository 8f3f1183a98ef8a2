//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (yt-dlp, ffmpeg) with
//! configurable timeouts and cancellation, so a hung tool never outlives the
//! request that started it.

use std::process::{ExitStatus, Output};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::core::error::AppError;

/// Default timeout for `--version` style probes
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// How a supervised child process ended.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The process exited on its own
    Exited(ExitStatus),
    /// The deadline passed; the process was killed
    TimedOut,
    /// The cancellation token fired; the process was killed
    Cancelled,
}

/// Run an async Command with a timeout.
///
/// Returns the process Output on success, or an AppError on timeout/IO failure.
/// The child is killed when the timeout elapses (`kill_on_drop`).
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Process(format!(
            "Process timed out after {:.1}s",
            timeout.as_secs_f64()
        ))),
    }
}

/// Makes the spawned tool the leader of a new process group.
///
/// yt-dlp runs ffmpeg for fragment downloads and merges; with its own group
/// those helpers are killed together with it by [`wait_or_kill`].
pub fn own_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Kills `child` and, when it leads its own process group, everything it started.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match i32::try_from(pid) {
                Ok(pgid) => match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                    Ok(()) => return,
                    // ESRCH: not a group leader, fall back to the child alone
                    Err(e) => log::debug!("killpg({}) failed: {}", pgid, e),
                },
                Err(_) => log::debug!("pid {} does not fit a process group id", pid),
            }
        }
    }

    if let Err(e) = child.start_kill() {
        log::warn!("Failed to kill child process: {}", e);
    }
}

/// Waits for `child` until it exits, `timeout` elapses or `cancel` fires.
///
/// On timeout or cancellation the child (with its process group, see
/// [`own_process_group`]) is killed and reaped before returning.
pub async fn wait_or_kill(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, AppError> {
    let outcome = tokio::select! {
        status = child.wait() => WaitOutcome::Exited(status?),
        _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
    };

    if !matches!(outcome, WaitOutcome::Exited(_)) {
        log::warn!("Terminating child process {:?}: {:?}", child.id(), outcome);
        kill_process_tree(child);
        if let Err(e) = child.wait().await {
            log::warn!("Failed to reap child process: {}", e);
        }
    }

    Ok(outcome)
}

/// Returns the first line of `<bin> <version_flag>`, or an error when the tool is missing.
pub async fn tool_version(bin: &str, version_flag: &str) -> Result<String, AppError> {
    let output = run_with_timeout(Command::new(bin).arg(version_flag), VERSION_PROBE_TIMEOUT)
        .await
        .map_err(|e| AppError::Process(format!("{} is not available: {}", bin, e)))?;

    if !output.status.success() {
        return Err(AppError::Process(format!(
            "{} {} exited with {}",
            bin, version_flag, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}
