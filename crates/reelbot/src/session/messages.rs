//! User-facing texts for commands and failures

use indoc::formatdoc;
use reelcore::core::utils::human_size;
use reelcore::download::DownloadError;
use reelcore::FailureCategory;

pub const INVALID_LINK: &str = "Please send a valid YouTube video URL.";

pub const BUSY: &str = "⏳ I'm still working on your previous link. Send this one again once it's done.";

/// `/start` and `/help` text
pub fn welcome_text(max_upload_bytes: u64) -> String {
    formatdoc! {"
        Send me a YouTube link and I’ll fetch the highest available quality and send the file back.
        Note: Max file size is ~{} (Telegram limit).",
        human_size(max_upload_bytes)
    }
}

/// Reply for a failed request, specific to its category.
pub fn failure_text(err: &DownloadError) -> String {
    if let DownloadError::Oversized { file_name, size, limit } = err {
        return format!(
            "Downloaded {} but it’s too large for Telegram ({} > {}).",
            file_name,
            human_size(*size),
            human_size(*limit)
        );
    }

    let text = match err.category() {
        FailureCategory::InvalidLink => INVALID_LINK,
        FailureCategory::ContentUnavailable => {
            "❌ This video can't be downloaded: it is private, removed, members-only or DRM-protected."
        }
        FailureCategory::GeoRestricted => "🌍 This video is not available in the bot's region.",
        FailureCategory::RateLimited => "🚦 YouTube is limiting requests right now. Please try again in a few minutes.",
        FailureCategory::Network => "📡 Network problem while downloading. Please try again.",
        FailureCategory::MergeFailed => "❌ Couldn't combine the video and audio streams into one file.",
        FailureCategory::Oversized => "❌ The file is too large for Telegram.",
        FailureCategory::TimedOut => "⌛ This took too long and was stopped. Please try again later.",
        FailureCategory::Cancelled => "⚠️ The bot is restarting and your download was interrupted. Please send the link again.",
        FailureCategory::Unknown => "❌ Something went wrong while processing this video.",
    };
    text.to_string()
}
