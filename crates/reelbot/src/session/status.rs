//! Status message rendering
//!
//! One status message per request is edited in place; this module turns the
//! current stage into its text. Messages are sent without a parse mode, so
//! nothing needs escaping.

use reelcore::core::utils::human_size;
use reelcore::download::ProgressInfo;

pub const ANALYZING: &str = "Analyzing link…";
pub const QUEUED: &str = "⏳ Waiting for your previous download to finish…";
pub const MERGING: &str = "🔧 Merging video and audio…";
pub const UPLOADING: &str = "Uploading to Telegram…";
pub const DONE: &str = "Done ✅";

/// Live download state shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Downloading {
        progress: u8,
        /// 1 for the video stream (or a combined file), 2 for the audio stream
        part: u8,
        speed_bytes_sec: Option<f64>,
        eta_seconds: Option<u64>,
        current_size: Option<u64>,
        total_size: Option<u64>,
    },
}

impl DownloadStatus {
    pub fn from_progress(info: &ProgressInfo) -> Self {
        DownloadStatus::Downloading {
            progress: info.percent,
            part: info.part,
            speed_bytes_sec: info.speed_bytes_sec,
            eta_seconds: info.eta_seconds,
            current_size: info.current_size,
            total_size: info.total_size,
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            DownloadStatus::Downloading {
                progress,
                part,
                speed_bytes_sec,
                eta_seconds,
                current_size,
                total_size,
            } => {
                let what = if *part > 1 { "audio" } else { "video" };
                let mut s = format!("📥 Downloading {}: {}%\n{}", what, progress, create_progress_bar(*progress));

                let mut details = Vec::new();
                if let Some(speed) = speed_bytes_sec {
                    details.push(format!("⚡ {}/s", human_size(*speed as u64)));
                }
                if let Some(eta) = eta_seconds {
                    details.push(format!("⏱ {}", format_eta(*eta)));
                }
                match (current_size, total_size) {
                    (Some(current), Some(total)) => {
                        details.push(format!("📦 {} / {}", human_size(*current), human_size(*total)))
                    }
                    (None, Some(total)) => details.push(format!("📦 {}", human_size(*total))),
                    _ => {}
                }

                if !details.is_empty() {
                    s.push('\n');
                    s.push_str(&details.join(" · "));
                }
                s
            }
        }
    }
}

/// Creates a progress bar like [█████░░░░░]
fn create_progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = (progress / 10) as usize;
    let empty = 10 - filled;

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

fn format_eta(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
