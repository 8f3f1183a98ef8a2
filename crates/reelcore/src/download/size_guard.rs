use std::path::Path;

use super::error::DownloadError;

/// Checks a finished file against the upload limit.
///
/// Returns the size in bytes when the file may be uploaded. A file exactly at
/// the limit passes.
pub async fn check_upload_size(path: &Path, limit: u64) -> Result<u64, DownloadError> {
    let size = fs_err::tokio::metadata(path).await?.len();
    if size > limit {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::warn!("{} is over the upload limit: {} > {} bytes", file_name, size, limit);
        return Err(DownloadError::Oversized { file_name, size, limit });
    }
    Ok(size)
}
