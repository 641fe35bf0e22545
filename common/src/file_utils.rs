//! File listing helpers for per-frame image folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extensions of the TIFF files exchanged with the external tracker.
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Returns the files of `dir` matching the given extensions, sorted by file name.
/// Extensions are matched case-insensitively.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| {
            if !path.is_file() {
                return false;
            }
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            extensions.contains(&ext.to_lowercase().as_str())
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Returns the TIFF files of `dir` in frame order.
pub fn tiff_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extensions(dir, TIFF_EXTENSIONS)
}
