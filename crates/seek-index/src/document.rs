//! Documents fed into the index and matches coming back out of it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A source file as the index sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDocument {
    /// Absolute path, used as the stable document id
    pub id: String,
    /// Path relative to the repository root (for display)
    pub relative_path: String,
    /// File content at the time it was read
    pub text: String,
    /// Modification time in seconds since the epoch
    pub modified_at: f64,
}

impl TrackedDocument {
    /// Build a document for `path`, deriving the display path from `repo_root`.
    pub fn new(path: &Path, repo_root: &Path, text: String, modified_at: f64) -> Self {
        let relative_path = path
            .strip_prefix(repo_root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());

        Self {
            id: path.to_string_lossy().into_owned(),
            relative_path,
            text,
            modified_at,
        }
    }
}

/// A single retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMatch {
    /// Display path (relative to the repository root when known)
    pub file: String,
    /// Relevance score, higher is better
    pub score: f32,
    /// The matched text span
    pub text: String,
    /// First line of the span (1-indexed)
    pub line_start: usize,
    /// Last line of the span (1-indexed)
    pub line_end: usize,
}

/// Modification time of `path` in seconds since the epoch.
///
/// Returns `None` when the file is missing or the platform has no mtime.
pub fn file_mtime(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(system_time_secs(modified))
}

pub(crate) fn system_time_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}
