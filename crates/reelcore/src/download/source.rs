//! Seams between the session and the external tools.
//!
//! The session only sees [`Retriever`] and [`Muxer`]; the yt-dlp and ffmpeg
//! implementations live in `ytdlp.rs` and `merge.rs`, and tests substitute fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::link::MediaLink;
use super::progress::ProgressInfo;

/// Bounded progress channel; producers drop samples when it is full.
pub type ProgressSender = mpsc::Sender<ProgressInfo>;

/// Capacity for progress channels created by sessions.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct RetrievalJob {
    pub link: MediaLink,
    /// Directory exclusively owned by this job
    pub scratch_dir: PathBuf,
    /// yt-dlp style output template inside `scratch_dir`
    pub output_template: PathBuf,
}

/// Result of a successful retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievedMedia {
    /// One file carrying both video and audio
    Muxed(PathBuf),
    /// Separate streams that still need merging
    Separate { video: PathBuf, audio: PathBuf },
}

impl RetrievedMedia {
    pub fn needs_merge(&self) -> bool {
        matches!(self, RetrievedMedia::Separate { .. })
    }
}

/// Fetches the best available rendition of a link.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Human-readable name (e.g. "yt-dlp")
    fn name(&self) -> &str;

    /// Downloads into `job.scratch_dir`, reporting progress through `progress`.
    ///
    /// Must stop the underlying work promptly once `cancel` fires.
    async fn retrieve(
        &self,
        job: &RetrievalJob,
        progress: ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<RetrievedMedia, DownloadError>;
}

/// Combines a video stream and an audio stream into one file without re-encoding.
#[async_trait]
pub trait Muxer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the merged file, written next to the inputs.
    async fn merge(&self, video: &Path, audio: &Path, cancel: &CancellationToken) -> Result<PathBuf, DownloadError>;
}
