//! Zip extraction and bounded layout discovery
//!
//! Upstream tool archives do not guarantee a stable internal layout, so the
//! expected `bin/` directory is searched for explicitly, breadth-first, down
//! to a fixed depth. Anything deeper is treated as "not found" rather than
//! scanned forever.

use crate::utils::error::MediagrabError;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Maximum directory depth searched below an extraction root
pub const MAX_SEARCH_DEPTH: usize = 4;

/// Extract a zip archive into `dest_dir`.
pub fn extract_archive(zip_path: &Path, dest_dir: &Path) -> Result<(), MediagrabError> {
    let file = fs::File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest_dir)?;
    archive.extract(dest_dir)?;

    debug!(
        "Extracted {} entries from {} into {}",
        archive.len(),
        zip_path.display(),
        dest_dir.display()
    );
    Ok(())
}

/// Locate a directory named `name` under `root`, at most [`MAX_SEARCH_DEPTH`]
/// levels down.
pub fn locate_nested_dir(root: &Path, name: &str) -> Result<PathBuf, MediagrabError> {
    let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
    queue.push_back((root.to_path_buf(), 0));

    while let Some((dir, depth)) = queue.pop_front() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if path.file_name().map(|n| n == name).unwrap_or(false) {
                return Ok(path);
            }
            if depth + 1 < MAX_SEARCH_DEPTH {
                queue.push_back((path, depth + 1));
            }
        }
    }

    Err(MediagrabError::NotFound(format!(
        "no `{}` directory within {} levels of {}",
        name,
        MAX_SEARCH_DEPTH,
        root.display()
    )))
}

/// Locate a file named `name` inside a located `dir`.
pub fn expect_file(dir: &Path, name: &str) -> Result<PathBuf, MediagrabError> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(MediagrabError::NotFound(format!(
            "expected file {} in {}",
            name,
            dir.display()
        )))
    }
}
