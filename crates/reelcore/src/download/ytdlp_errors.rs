//! Classification of yt-dlp failures
//!
//! yt-dlp reports every failure as free text on stderr with exit code 1.
//! This module maps that text onto a [`FailureCategory`] so the user gets a
//! specific answer and the operator gets a hint in the logs.

use super::error::FailureCategory;

/// Analyzes yt-dlp stderr and returns the failure category.
///
/// Checks run from most to least specific: geo blocks are reported as
/// "not available" too, so they are matched before generic unavailability.
pub fn classify_ytdlp_failure(stderr: &str) -> FailureCategory {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("in your country")
        || stderr_lower.contains("geo restrict")
        || stderr_lower.contains("geo-restrict")
        || stderr_lower.contains("georestrict")
        || stderr_lower.contains("not available in your region")
    {
        return FailureCategory::GeoRestricted;
    }

    if stderr_lower.contains("drm protected")
        || stderr_lower.contains("drm-protected")
        || stderr_lower.contains("private video")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("video is not available")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("has been removed")
        || stderr_lower.contains("does not exist")
        || stderr_lower.contains("members-only")
        || stderr_lower.contains("join this channel")
        || stderr_lower.contains("confirm your age")
        || stderr_lower.contains("this live event will begin")
        || stderr_lower.contains("premieres in")
        || stderr_lower.contains("account associated with this video has been terminated")
    {
        return FailureCategory::ContentUnavailable;
    }

    if stderr_lower.contains("http error 429")
        || stderr_lower.contains("too many requests")
        || stderr_lower.contains("rate-limit")
        || stderr_lower.contains("rate limit")
        || stderr_lower.contains("not a bot")
        || stderr_lower.contains("http error 403")
    {
        return FailureCategory::RateLimited;
    }

    if stderr_lower.contains("postprocessing")
        || stderr_lower.contains("ffmpeg not found")
        || stderr_lower.contains("conversion failed")
        || stderr_lower.contains("error merging")
    {
        return FailureCategory::MergeFailed;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection reset")
        || stderr_lower.contains("connection refused")
        || stderr_lower.contains("connection aborted")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("name or service not known")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("getaddrinfo failed")
        || stderr_lower.contains("failed to resolve")
        || stderr_lower.contains("unable to download webpage")
        || stderr_lower.contains("eof occurred in violation of protocol")
        || stderr_lower.contains("incompleteread")
    {
        return FailureCategory::Network;
    }

    FailureCategory::Unknown
}

/// Picks the most relevant line of yt-dlp stderr for logs and error details.
///
/// Prefers the last `ERROR:` line, otherwise the last non-empty line.
pub fn summarize_stderr(stderr: &str) -> &str {
    let mut last_non_empty = "";
    let mut last_error = None;
    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("ERROR:") {
            last_error = Some(line);
        }
        last_non_empty = line;
    }
    last_error.unwrap_or(last_non_empty)
}

/// Operator-facing hint logged next to a failure.
pub fn operator_hint(category: FailureCategory) -> Option<&'static str> {
    match category {
        FailureCategory::RateLimited => Some(
            "YouTube is throttling this host: update yt-dlp, try other YTDL_PLAYER_CLIENTS or wait before retrying",
        ),
        FailureCategory::MergeFailed => Some("Check that FFMPEG_BIN points to a working ffmpeg build"),
        FailureCategory::Unknown => Some("Unrecognized yt-dlp failure: updating yt-dlp usually helps (yt-dlp -U)"),
        _ => None,
    }
}
