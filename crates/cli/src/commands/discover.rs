use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::debug;
use walkdir::WalkDir;

pub const DYLIB_EXTENSION: &str = "dylib";

/// Collect the dylibs to test under `path`.
///
/// A file argument is accepted as-is (after resolving symlinks) if it can be
/// read. A directory is walked recursively in file-name order, keeping
/// readable `*.dylib` entries, until `max_files` is reached. A limit of zero
/// means no limit.
pub fn find_dylibs(path: &Path, max_files: Option<usize>) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(anyhow!("Input path does not exist: {}", path.display()));
    }

    if path.is_file() {
        return Ok(resolve_readable(path).into_iter().collect());
    }

    let limit = max_files.filter(|&n| n > 0);
    let mut dylibs = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(DYLIB_EXTENSION) {
            continue;
        }
        let Some(resolved) = resolve_readable(entry.path()) else {
            debug!(path = %entry.path().display(), "skipping unreadable entry");
            continue;
        };
        dylibs.push(resolved);
        if limit.is_some_and(|n| dylibs.len() >= n) {
            break;
        }
    }
    Ok(dylibs)
}

fn resolve_readable(path: &Path) -> Option<PathBuf> {
    let resolved = path.canonicalize().ok()?;
    if resolved.is_file() && fs::File::open(&resolved).is_ok() {
        Some(resolved)
    } else {
        None
    }
}
