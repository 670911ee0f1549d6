//! Freshness checks of idempotent pipeline stages.
//!
//! A stage is skipped when its output exists, is not empty and is not older than any of its
//! inputs. Missing inputs are ignored, so optional files never invalidate an output.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Latest modification time among existing paths.
pub fn newest<P: AsRef<Path>>(paths: &[P]) -> Option<SystemTime> {
    paths.iter().filter_map(|p| modified(p.as_ref())).max()
}

pub fn is_fresh<P: AsRef<Path>>(output: &Path, inputs: &[P]) -> bool {
    let meta = match std::fs::metadata(output) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => meta,
        _ => return false,
    };
    let Ok(written) = meta.modified() else {
        return false;
    };
    match newest(inputs) {
        Some(latest) => written >= latest,
        None => true,
    }
}

/// Files of `dir` with the given extension, sorted. An absent directory has none.
pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == ext))
            .collect(),
        Err(_) => vec![],
    };
    files.sort();
    files
}
