//! ffmpeg backed [`Muxer`]
//!
//! Streams are copied, never re-encoded. The container follows the inputs:
//! H.264/AAC style pairs go to MP4, VP9/Opus pairs to WebM, anything else to
//! Matroska, which accepts every codec pairing yt-dlp can produce.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::source::Muxer;
use crate::core::config::Settings;
use crate::core::process::{own_process_group, wait_or_kill, WaitOutcome};
use crate::core::utils::truncate_tail_utf8;

/// Longest ffmpeg stderr excerpt carried in an error
const STDERR_EXCERPT_BYTES: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Webm,
    Mkv,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Mkv => "mkv",
        }
    }
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Picks the output container for a video/audio pair.
pub fn select_container(video: &Path, audio: &Path) -> Container {
    match (lowercase_extension(video).as_str(), lowercase_extension(audio).as_str()) {
        ("mp4" | "m4v", "m4a" | "mp4" | "aac") => Container::Mp4,
        ("webm", "webm" | "weba" | "opus" | "ogg") => Container::Webm,
        _ => Container::Mkv,
    }
}

/// Output path next to the video stream, with yt-dlp's format suffix dropped
/// (`abc.f137.mp4` becomes `abc.mp4`).
pub fn merged_output_path(video: &Path, audio: &Path, container: Container) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    let base = match stem.rsplit_once('.') {
        Some((base, format_id)) if !base.is_empty() && format_id.starts_with('f') => base.to_string(),
        _ => stem,
    };

    let output = video.with_file_name(format!("{}.{}", base, container.extension()));
    if output == video || output == audio {
        video.with_file_name(format!("{}.merged.{}", base, container.extension()))
    } else {
        output
    }
}

/// Merges separate streams by running the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    bin: String,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ffmpeg_bin.clone(), settings.merge_timeout())
    }

    /// ffmpeg arguments: first video track of `video`, first audio track of `audio`, stream copy.
    pub fn build_args(video: &Path, audio: &Path, output: &Path, container: Container) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(video.as_os_str().to_owned());
        args.push("-i".into());
        args.push(audio.as_os_str().to_owned());
        for arg in ["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"] {
            args.push(arg.into());
        }
        if container == Container::Mp4 {
            args.push("-movflags".into());
            args.push("+faststart".into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs_err::tokio::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn merge(&self, video: &Path, audio: &Path, cancel: &CancellationToken) -> Result<PathBuf, DownloadError> {
        let container = select_container(video, audio);
        let output = merged_output_path(video, audio, container);
        let args = Self::build_args(video, audio, &output, container);

        log::info!(
            "Merging {} + {} into {}",
            video.display(),
            audio.display(),
            output.display()
        );

        let mut command = Command::new(&self.bin);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = own_process_group(&mut command)
            .spawn()
            .map_err(|e| DownloadError::MergeFailed(format!("failed to start {}: {}", self.bin, e)))?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let outcome = wait_or_kill(&mut child, self.timeout, cancel)
            .await
            .map_err(|e| DownloadError::MergeFailed(e.to_string()))?;

        let status = match outcome {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut | WaitOutcome::Cancelled => {
                if let Some(task) = stderr_task {
                    task.abort();
                }
                remove_quietly(&output).await;
                return Err(match outcome {
                    WaitOutcome::Cancelled => DownloadError::Cancelled("merge"),
                    _ => DownloadError::TimedOut {
                        stage: "merge",
                        after: self.timeout,
                    },
                });
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            remove_quietly(&output).await;
            let excerpt = truncate_tail_utf8(stderr.trim(), STDERR_EXCERPT_BYTES);
            log::error!("ffmpeg exited with {}: {}", status, excerpt);
            return Err(DownloadError::MergeFailed(format!("ffmpeg exited with {}: {}", status, excerpt)));
        }

        let size = match fs_err::tokio::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(e) => return Err(DownloadError::MergeFailed(format!("merged file missing: {}", e))),
        };
        if size == 0 {
            remove_quietly(&output).await;
            return Err(DownloadError::MergeFailed("ffmpeg produced an empty file".to_string()));
        }

        remove_quietly(video).await;
        remove_quietly(audio).await;

        log::info!("Merged into {} ({} bytes)", output.display(), size);
        Ok(output)
    }
}
