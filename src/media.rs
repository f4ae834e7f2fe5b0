//! Media discovery: scan the photo directory for displayable images.
//!
//! Only the top level of the directory is scanned. Extensions are compared
//! case-insensitively, so `beach.JPG` matches `.jpg`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Normalise a configured extension: lowercase, no leading dot.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Whether `path` has one of the given (already normalised) extensions.
fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    extensions.iter().any(|allowed| *allowed == ext)
}

/// List image files in `dir`, sorted by path.
///
/// A missing directory yields an empty list (logged as a warning) so the
/// caller can treat it the same as an empty one. Any other I/O failure is
/// returned.
pub fn list_images(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!("Directory does not exist: {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let extensions: Vec<String> = extensions.iter().map(|e| normalize_extension(e)).collect();

    let mut paths: Vec<PathBuf> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, &extensions))
        .collect();

    paths.sort();
    Ok(paths)
}
