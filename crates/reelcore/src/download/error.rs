use std::time::Duration;

use thiserror::Error;

/// User-visible failure categories.
///
/// Every failing stage of a session maps its error into exactly one of these;
/// the chat layer picks the reply text from the category alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureCategory {
    InvalidLink,
    /// DRM-protected, private, removed or otherwise not downloadable
    ContentUnavailable,
    GeoRestricted,
    /// The source site throttled or blocked us
    RateLimited,
    Network,
    MergeFailed,
    Oversized,
    TimedOut,
    /// Shutdown interrupted the request
    Cancelled,
    Unknown,
}

/// Structured error type for the download pipeline.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("not a supported link: {0}")]
    InvalidLink(String),

    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("geo-restricted: {0}")]
    GeoRestricted(String),

    #[error("rate limited by source: {0}")]
    RateLimited(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("{file_name} is {size} bytes, limit is {limit} bytes")]
    Oversized { file_name: String, size: u64, limit: u64 },

    #[error("{stage} timed out after {:.1}s", .after.as_secs_f64())]
    TimedOut { stage: &'static str, after: Duration },

    #[error("cancelled during {0}")]
    Cancelled(&'static str),

    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    /// Returns the category shown to the user
    pub fn category(&self) -> FailureCategory {
        match self {
            DownloadError::InvalidLink(_) => FailureCategory::InvalidLink,
            DownloadError::ContentUnavailable(_) => FailureCategory::ContentUnavailable,
            DownloadError::GeoRestricted(_) => FailureCategory::GeoRestricted,
            DownloadError::RateLimited(_) => FailureCategory::RateLimited,
            DownloadError::Network(_) => FailureCategory::Network,
            DownloadError::MergeFailed(_) => FailureCategory::MergeFailed,
            DownloadError::Oversized { .. } => FailureCategory::Oversized,
            DownloadError::TimedOut { .. } => FailureCategory::TimedOut,
            DownloadError::Cancelled(_) => FailureCategory::Cancelled,
            DownloadError::Unknown(_) => FailureCategory::Unknown,
        }
    }

    /// Builds an error from a classified tool failure.
    ///
    /// Categories that carry structured data (`Oversized`, `TimedOut`,
    /// `Cancelled`) never come out of output classification and fall back to `Unknown`.
    pub fn from_category(category: FailureCategory, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match category {
            FailureCategory::InvalidLink => DownloadError::InvalidLink(detail),
            FailureCategory::ContentUnavailable => DownloadError::ContentUnavailable(detail),
            FailureCategory::GeoRestricted => DownloadError::GeoRestricted(detail),
            FailureCategory::RateLimited => DownloadError::RateLimited(detail),
            FailureCategory::Network => DownloadError::Network(detail),
            FailureCategory::MergeFailed => DownloadError::MergeFailed(detail),
            FailureCategory::Oversized
            | FailureCategory::TimedOut
            | FailureCategory::Cancelled
            | FailureCategory::Unknown => DownloadError::Unknown(detail),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Unknown(format!("I/O error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels() {
        assert_eq!(FailureCategory::GeoRestricted.as_ref(), "geo_restricted");
        assert_eq!(FailureCategory::ContentUnavailable.to_string(), "content_unavailable");
    }

    #[test]
    fn test_category_round_trip_through_classification() {
        for category in [
            FailureCategory::ContentUnavailable,
            FailureCategory::GeoRestricted,
            FailureCategory::RateLimited,
            FailureCategory::Network,
            FailureCategory::MergeFailed,
        ] {
            assert_eq!(DownloadError::from_category(category, "x").category(), category);
        }
        assert_eq!(
            DownloadError::from_category(FailureCategory::Oversized, "x").category(),
            FailureCategory::Unknown
        );
    }

    #[test]
    fn test_display() {
        let err = DownloadError::TimedOut {
            stage: "download",
            after: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "download timed out after 90.0s");

        let err = DownloadError::TimedOut {
            stage: "merge",
            after: Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "merge timed out after 0.3s");

        let err = DownloadError::Oversized {
            file_name: "abc.mp4".into(),
            size: 10,
            limit: 5,
        };
        assert_eq!(err.category(), FailureCategory::Oversized);
        assert_eq!(err.to_string(), "abc.mp4 is 10 bytes, limit is 5 bytes");
    }

    #[test]
    fn test_io_errors_are_unknown() {
        let err: DownloadError = std::io::Error::other("disk gone").into();
        assert_eq!(err.category(), FailureCategory::Unknown);
    }
}
