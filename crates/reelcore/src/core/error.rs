use thiserror::Error;

use crate::core::config::ConfigError;
use crate::download::error::DownloadError;

/// Centralized error types for the application
///
/// Pipeline failures that the user gets to see are `DownloadError`s; this enum
/// wraps them together with the infrastructure errors that only end up in logs.
///
/// # Example
///
/// ```
/// use reelcore::core::error::AppError;
///
/// let err = AppError::Process("yt-dlp exited with status 2".into());
/// assert_eq!(err.to_string(), "Process error: yt-dlp exited with status 2");
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading/validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Categorized download pipeline errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External process failures (spawn, exit code, timeout)
    #[error("Process error: {0}")]
    Process(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
