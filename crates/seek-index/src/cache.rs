//! Per-repository cache locations.

use std::path::{Path, PathBuf};

/// Hex md5 digest of the repository root path.
///
/// Different repositories never share a cache directory, and the digest has
/// no tool version in it so the cache survives upgrades.
pub fn repo_hash(repo_root: &Path) -> String {
    let digest = md5::compute(repo_root.to_string_lossy().as_bytes());
    format!("{digest:x}")
}

/// Cache directory for `repo_root` under `cache_root`.
pub fn cache_dir_for(cache_root: &Path, repo_root: &Path) -> PathBuf {
    cache_root.join(repo_hash(repo_root))
}
