//! Per-request scratch directories

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Extensions yt-dlp uses for in-flight or bookkeeping files
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

/// A directory exclusively owned by one request.
///
/// Everything the request writes lives here. The directory and its contents
/// are removed by [`ScratchSpace::close`] or, failing that, on drop, so every
/// exit path (errors and panics included) cleans up.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchSpace {
    /// Creates a fresh directory under `root`, named after `label`
    /// plus a random suffix.
    pub fn create(root: &Path, label: &str) -> io::Result<Self> {
        fs_err::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("reel_{}_", label))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        log::debug!("Created scratch space {}", path.display());
        Ok(Self { dir: Some(dir), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// yt-dlp output template placing every file in this space
    pub fn output_template(&self) -> PathBuf {
        self.path.join("%(id)s.%(ext)s")
    }

    /// Completed media files in the space, sorted by name.
    ///
    /// Partial downloads and fragment leftovers are skipped.
    pub fn media_files(&self) -> io::Result<Vec<PathBuf>> {
        list_media_files(&self.path)
    }

    /// Removes the directory, reporting failures.
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                log::debug!("Removed scratch space {}", self.path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove scratch space {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Completed media files directly inside `dir`, sorted by name.
pub fn list_media_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || is_partial(&path) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn is_partial(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.contains(".part-Frag") {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PARTIAL_EXTENSIONS.contains(&ext))
}
