//! Download management: link validation, retrieval via yt-dlp, muxing via
//! ffmpeg, the upload size guard and per-request scratch spaces.

pub mod error;
pub mod link;
pub mod merge;
pub mod progress;
pub mod scratch;
pub mod size_guard;
pub mod source;
pub mod ytdlp;
pub mod ytdlp_errors;

pub use error::{DownloadError, FailureCategory};
pub use link::{parse_media_link, MediaLink};
pub use merge::FfmpegMuxer;
pub use progress::{ProgressInfo, ProgressThrottle};
pub use scratch::ScratchSpace;
pub use size_guard::check_upload_size;
pub use source::{Muxer, ProgressSender, RetrievalJob, RetrievedMedia, Retriever};
pub use ytdlp::YtDlpRetriever;
