//! Link validation for the supported video host.

use lazy_regex::regex_captures;
use url::Url;

use super::error::DownloadError;

/// A validated, normalized video link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    /// Absolute URL handed to the downloader
    pub url: Url,
    /// Video identifier as it appears in the link
    pub video_id: String,
}

/// Checks that `text` is a single link to a video on the supported host.
///
/// Accepted shapes (scheme optional, host case-insensitive):
/// `youtube.com/watch?v=ID`, `youtube.com/shorts/ID`, `youtube.com/embed/ID`,
/// `youtube.com/live/ID`, the `www.`/`m.`/`music.` subdomains, and `youtu.be/ID`.
/// Anything surrounding the link other than whitespace makes it invalid.
pub fn parse_media_link(text: &str) -> Result<MediaLink, DownloadError> {
    let candidate = text.trim();
    if candidate.is_empty() {
        return Err(DownloadError::InvalidLink("empty message".to_string()));
    }

    let (_, video_id) = regex_captures!(
        r"(?i)^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]+)(?:[?&#/]\S*)?$",
        candidate
    )
    .ok_or_else(|| DownloadError::InvalidLink(candidate.to_string()))?;

    let absolute = if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("https://{}", candidate)
    };

    let url = Url::parse(&absolute).map_err(|e| DownloadError::InvalidLink(format!("{}: {}", candidate, e)))?;

    Ok(MediaLink {
        url,
        video_id: video_id.to_string(),
    })
}
