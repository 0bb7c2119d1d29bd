//! Repository walking for the full-scan fallback.
//!
//! A file is indexable when it is not inside a hidden directory, does not
//! match a pattern from the repository's ignore file, has no known binary
//! extension, stays under the size cap, and has no NUL byte in its first
//! bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

/// Default size cap for indexed files (1 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Default number of leading bytes inspected for NUL bytes.
pub const DEFAULT_BINARY_SNIFF_BYTES: usize = 1024;

/// Extensions that are never worth reading as text.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "icns",
    // audio / video
    "mp3", "wav", "flac", "ogg", "m4a", "mp4", "mov", "avi", "mkv", "webm",
    // archives
    "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "war", "whl",
    // compiled artifacts
    "exe", "dll", "so", "dylib", "o", "a", "obj", "lib", "class", "pyc", "pyo", "wasm",
    "bin", "rlib",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // documents and data blobs
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "sqlite", "sqlite3", "db", "npy",
    "npz", "pkl", "parquet",
];

/// Errors that can occur while preparing a walk.
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Failed to read ignore file {path:?}: {source}")]
    IgnoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filters applied during the full-repository walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Ignore file name, relative to the repository root
    pub ignore_file: String,
    /// Files larger than this are skipped
    pub max_file_bytes: u64,
    /// Leading bytes checked for NUL
    pub binary_sniff_bytes: usize,
    /// Also honour .gitignore files
    pub respect_gitignore: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            ignore_file: crate::IGNORE_FILE_NAME.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            binary_sniff_bytes: DEFAULT_BINARY_SNIFF_BYTES,
            respect_gitignore: false,
        }
    }
}

/// Decides which files under a repository root are indexable.
#[derive(Debug, Clone)]
pub struct RepoFilter {
    root: PathBuf,
    ignore: Gitignore,
    options: WalkOptions,
}

impl RepoFilter {
    /// Build a filter for `root`, reading its ignore file if present.
    pub fn new(root: &Path, options: WalkOptions) -> Result<Self, WalkError> {
        let ignore = load_ignore_file(root, &options.ignore_file)?;
        Ok(Self {
            root: root.to_path_buf(),
            ignore,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (or a parent directory) matches an ignore pattern.
    /// Paths outside the root never match.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.ignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    /// Whether any directory between the root and `path` is hidden.
    pub fn in_hidden_dir(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let Some(parent) = relative.parent() else {
            return false;
        };
        parent.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        })
    }

    /// Full indexability check for a single file.
    pub fn accepts_file(&self, path: &Path) -> bool {
        if self.in_hidden_dir(path) || self.is_ignored(path, false) {
            return false;
        }
        if has_binary_extension(path) {
            return false;
        }
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() <= self.options.max_file_bytes => {}
            _ => return false,
        }
        !has_nul_prefix(path, self.options.binary_sniff_bytes)
    }

    /// Walk the repository and return indexable files, sorted.
    pub fn walk(&self) -> Vec<PathBuf> {
        let respect = self.options.respect_gitignore;
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .require_git(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                entry.depth() == 0 || !(is_dir && entry.file_name().to_string_lossy().starts_with('.'))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            if self.accepts_file(path) {
                files.push(path.to_path_buf());
            } else {
                debug!("Skipping {:?}", path);
            }
        }

        files.sort();
        files
    }
}

/// Parse the ignore file: one glob per line, blank and `#` lines skipped.
fn load_ignore_file(root: &Path, name: &str) -> Result<Gitignore, WalkError> {
    let path = root.join(name);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Gitignore::empty()),
        Err(source) => return Err(WalkError::IgnoreFile { path, source }),
    };

    let mut builder = GitignoreBuilder::new(root);
    for line in content.lines() {
        let pattern = line.trim();
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        if let Err(e) = builder.add_line(Some(path.clone()), pattern) {
            warn!("Ignoring invalid pattern {:?} in {:?}: {}", pattern, path, e);
        }
    }

    match builder.build() {
        Ok(gitignore) => Ok(gitignore),
        Err(e) => {
            warn!("Failed to compile {:?}, ignoring it: {}", path, e);
            Ok(Gitignore::empty())
        }
    }
}

fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// NUL byte within the first `limit` bytes. Unreadable files count as binary.
fn has_nul_prefix(path: &Path, limit: usize) -> bool {
    let mut head = Vec::with_capacity(limit);
    match File::open(path).and_then(|f| f.take(limit as u64).read_to_end(&mut head)) {
        Ok(_) => head.contains(&0),
        Err(e) => {
            debug!("Cannot sniff {:?}: {}", path, e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_skips_hidden_dirs_and_binaries() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join(".git/config"), "[core]").unwrap();
        fs::write(root.join("src/main.py"), "print('hi')").unwrap();
        fs::write(root.join("logo.png"), "not really a png").unwrap();
        fs::write(root.join("blob.txt"), b"abc\0def").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();

        let filter = RepoFilter::new(root, WalkOptions::default()).unwrap();
        assert_eq!(names(root, &filter.walk()), vec!["README.md", "src/main.py"]);
    }

    #[test]
    fn test_walk_honours_ignore_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join(".seekignore"), "# generated\n\n*.log\nbuild/\n").unwrap();
        fs::write(root.join("app.py"), "x = 1").unwrap();
        fs::write(root.join("debug.log"), "trace").unwrap();
        fs::write(root.join("build/out.py"), "y = 2").unwrap();

        let filter = RepoFilter::new(root, WalkOptions::default()).unwrap();
        let found = names(root, &filter.walk());
        assert!(found.contains(&"app.py".to_string()));
        assert!(!found.contains(&"debug.log".to_string()));
        assert!(!found.contains(&"build/out.py".to_string()));
    }

    #[test]
    fn test_walk_skips_large_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("big.txt"), "a".repeat(64)).unwrap();
        fs::write(root.join("small.txt"), "a").unwrap();

        let options = WalkOptions {
            max_file_bytes: 16,
            ..Default::default()
        };
        let filter = RepoFilter::new(root, options).unwrap();
        assert_eq!(names(root, &filter.walk()), vec!["small.txt"]);
    }

    #[test]
    fn test_nul_beyond_sniff_window_is_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late.txt");
        let mut content = vec![b'a'; 2048];
        content.push(0);
        fs::write(&path, content).unwrap();

        assert!(!has_nul_prefix(&path, DEFAULT_BINARY_SNIFF_BYTES));
        assert!(has_nul_prefix(&path, 4096));
    }

    #[test]
    fn test_is_ignored_outside_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".seekignore"), "*.py\n").unwrap();
        let filter = RepoFilter::new(dir.path(), WalkOptions::default()).unwrap();
        assert!(filter.is_ignored(&dir.path().join("a.py"), false));
        assert!(!filter.is_ignored(Path::new("/somewhere/else/a.py"), false));
    }

    #[test]
    fn test_in_hidden_dir() {
        let filter = RepoFilter::new(Path::new("/repo-that-does-not-exist"), WalkOptions::default())
            .unwrap();
        assert!(filter.in_hidden_dir(Path::new("/repo-that-does-not-exist/.venv/lib/x.py")));
        assert!(!filter.in_hidden_dir(Path::new("/repo-that-does-not-exist/src/.env")));
    }

    #[test]
    fn test_binary_extension_case_insensitive() {
        assert!(has_binary_extension(Path::new("photo.JPG")));
        assert!(!has_binary_extension(Path::new("main.rs")));
        assert!(!has_binary_extension(Path::new("Makefile")));
    }
}
