//! yt-dlp backed [`Retriever`]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::progress::parse_progress;
use super::scratch::list_media_files;
use super::source::{ProgressSender, RetrievalJob, RetrievedMedia, Retriever};
use super::ytdlp_errors::{classify_ytdlp_failure, operator_hint, summarize_stderr};
use crate::core::config::Settings;
use crate::core::process::{own_process_group, wait_or_kill, WaitOutcome};

/// Best video plus best audio, else the best single file
const FORMAT_SELECTOR: &str = "bv*+ba/b";

/// Merged and single-file results are remuxed into MP4 so Telegram can stream them
const OUTPUT_CONTAINER: &str = "mp4";

/// stderr lines kept for classification
const STDERR_TAIL_LINES: usize = 40;

const AUDIO_ONLY_EXTENSIONS: &[&str] = &["m4a", "mp3", "opus", "ogg", "oga", "aac", "flac", "wav", "weba"];

/// What the stdout reader learned about the files yt-dlp wrote.
#[derive(Debug, Default)]
struct OutputLog {
    /// Stream files in download order (video first)
    destinations: Vec<PathBuf>,
    /// File yt-dlp merged the streams into, if it did
    merge_target: Option<PathBuf>,
}

/// Retrieves media by running the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpRetriever {
    bin: String,
    ffmpeg_location: Option<String>,
    timeout: Duration,
    concurrent_fragments: u32,
    player_clients: Vec<String>,
    user_agent: Option<String>,
}

impl YtDlpRetriever {
    /// Retriever with default flags and no extractor tweaks.
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            ffmpeg_location: None,
            timeout,
            concurrent_fragments: 1,
            player_clients: Vec::new(),
            user_agent: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        // Only pass --ffmpeg-location for explicit paths; bare names are resolved via PATH by yt-dlp itself
        let ffmpeg_location = Path::new(&settings.ffmpeg_bin)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|_| settings.ffmpeg_bin.clone());

        Self {
            bin: settings.ytdl_bin.clone(),
            ffmpeg_location,
            timeout: settings.download_timeout(),
            concurrent_fragments: settings.concurrent_fragments,
            player_clients: settings.player_clients().into_iter().map(String::from).collect(),
            user_agent: Some(settings.ytdl_user_agent.clone()).filter(|ua| !ua.trim().is_empty()),
        }
    }

    /// Full argument list for one job.
    pub fn build_args(&self, job: &RetrievalJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-colors".into(),
            "--no-mtime".into(),
            "--format".into(),
            FORMAT_SELECTOR.into(),
            "--merge-output-format".into(),
            OUTPUT_CONTAINER.into(),
            "--remux-video".into(),
            OUTPUT_CONTAINER.into(),
            "--postprocessor-args".into(),
            "Merger:-movflags +faststart".into(),
            "--postprocessor-args".into(),
            "VideoRemuxer:-movflags +faststart".into(),
            "--concurrent-fragments".into(),
            self.concurrent_fragments.to_string(),
        ];

        if !self.player_clients.is_empty() {
            args.push("--extractor-args".into());
            args.push(format!("youtube:player_client={}", self.player_clients.join(",")));
        }
        if let Some(ua) = &self.user_agent {
            args.push("--add-header".into());
            args.push(format!("User-Agent:{}", ua));
        }
        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone());
        }

        args.push("--output".into());
        args.push(job.output_template.to_string_lossy().into_owned());
        args.push("--".into());
        args.push(job.link.url.to_string());
        args
    }
}

#[async_trait]
impl Retriever for YtDlpRetriever {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn retrieve(
        &self,
        job: &RetrievalJob,
        progress: ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<RetrievedMedia, DownloadError> {
        let args = self.build_args(job);
        log::info!("yt-dlp command: {} {}", self.bin, args.join(" "));

        let mut command = Command::new(&self.bin);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = own_process_group(&mut command)
            .spawn()
            .map_err(|e| DownloadError::Unknown(format!("failed to start {}: {}", self.bin, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Unknown("yt-dlp stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Unknown("yt-dlp stderr not captured".to_string()))?;

        let stdout_task = tokio::spawn(read_output(stdout, progress));
        let stderr_task = tokio::spawn(read_stderr_tail(stderr));

        let outcome = wait_or_kill(&mut child, self.timeout, cancel)
            .await
            .map_err(|e| DownloadError::Unknown(e.to_string()))?;

        let status = match outcome {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut => {
                stdout_task.abort();
                stderr_task.abort();
                log::error!("yt-dlp timed out after {:.1}s for {}", self.timeout.as_secs_f64(), job.link.url);
                return Err(DownloadError::TimedOut {
                    stage: "download",
                    after: self.timeout,
                });
            }
            WaitOutcome::Cancelled => {
                stdout_task.abort();
                stderr_task.abort();
                log::info!("yt-dlp cancelled for {}", job.link.url);
                return Err(DownloadError::Cancelled("download"));
            }
        };

        let output_log = stdout_task.await.unwrap_or_default();
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let category = classify_ytdlp_failure(&stderr_tail);
            let summary = match summarize_stderr(&stderr_tail) {
                "" => format!("yt-dlp exited with {}", status),
                line => line.to_string(),
            };
            log::error!("yt-dlp failed for {} [{}]: {}", job.link.url, category, summary);
            if let Some(hint) = operator_hint(category) {
                log::warn!("{}", hint);
            }
            return Err(DownloadError::from_category(category, summary));
        }

        let files = list_media_files(&job.scratch_dir)?;
        let media = resolve_output(&files, &output_log)?;
        log::info!("yt-dlp finished for {}: {:?}", job.link.url, media);
        Ok(media)
    }
}

/// Reads yt-dlp stdout, forwarding progress and collecting output paths.
async fn read_output<R: AsyncRead + Unpin>(stdout: R, progress: ProgressSender) -> OutputLog {
    let mut log_state = OutputLog::default();
    let mut segments = BufReader::new(stdout).split(b'\n');

    while let Ok(Some(raw)) = segments.next_segment().await {
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');

        if let Some(path) = parse_destination(line) {
            let seen = log_state.destinations.iter().any(|d| d.file_name() == path.file_name());
            if !seen {
                log_state.destinations.push(path);
            }
            continue;
        }
        if let Some(path) = parse_merge_target(line) {
            log_state.merge_target = Some(path);
            continue;
        }
        match parse_progress(line) {
            Some(mut info) => {
                info.part = log_state.destinations.len().clamp(1, u8::MAX as usize) as u8;
                // A full channel just means the consumer is behind; skip the sample
                let _ = progress.try_send(info);
            }
            None => log::trace!("yt-dlp: {}", line),
        }
    }

    log_state
}

/// Keeps the last lines of yt-dlp stderr.
async fn read_stderr_tail<R: AsyncRead + Unpin>(stderr: R) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut segments = BufReader::new(stderr).split(b'\n');

    while let Ok(Some(raw)) = segments.next_segment().await {
        let line = String::from_utf8_lossy(&raw).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        log::debug!("yt-dlp stderr: {}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

/// Path from "[download] Destination: PATH" or "[download] PATH has already been downloaded".
fn parse_destination(line: &str) -> Option<PathBuf> {
    let rest = line.strip_prefix("[download]")?.trim();
    if let Some(path) = rest.strip_prefix("Destination:") {
        return Some(PathBuf::from(path.trim()));
    }
    rest.strip_suffix("has already been downloaded")
        .map(|path| PathBuf::from(path.trim()))
}

/// Path from `[Merger] Merging formats into "PATH"`.
fn parse_merge_target(line: &str) -> Option<PathBuf> {
    let rest = line.strip_prefix("[Merger] Merging formats into")?.trim();
    Some(PathBuf::from(rest.trim_matches('"')))
}

fn is_audio_only(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| AUDIO_ONLY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Decides what yt-dlp left behind in the scratch space.
fn resolve_output(files: &[PathBuf], output_log: &OutputLog) -> Result<RetrievedMedia, DownloadError> {
    let find = |wanted: &Path| files.iter().find(|f| f.file_name() == wanted.file_name()).cloned();

    if let Some(merged) = output_log.merge_target.as_deref().and_then(find) {
        return Ok(RetrievedMedia::Muxed(merged));
    }

    match files {
        [] => Err(DownloadError::Unknown(
            "yt-dlp finished without producing a file".to_string(),
        )),
        [single] => Ok(RetrievedMedia::Muxed(single.clone())),
        _ => {
            let streams: Vec<PathBuf> = output_log.destinations.iter().filter_map(|d| find(d.as_path())).collect();
            if let [video, audio] = streams.as_slice() {
                return Ok(RetrievedMedia::Separate {
                    video: video.clone(),
                    audio: audio.clone(),
                });
            }

            let (audio, video): (Vec<&PathBuf>, Vec<&PathBuf>) = files.iter().partition(|f| is_audio_only(f));
            match (video.as_slice(), audio.as_slice()) {
                ([video], [audio]) => Ok(RetrievedMedia::Separate {
                    video: (*video).clone(),
                    audio: (*audio).clone(),
                }),
                _ => Err(DownloadError::Unknown(format!(
                    "cannot tell the streams apart among {} files",
                    files.len()
                ))),
            }
        }
    }
}
