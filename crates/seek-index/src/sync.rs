//! Keeps a persisted index consistent with a set of source files.
//!
//! Each sync computes a [`SyncPlan`] by comparing the current file set with
//! the documents already indexed, using modification times to find changed
//! files. Only the difference is applied before the index is persisted to
//! the per-repository cache directory.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::{file_mtime, ContextMatch, TrackedDocument};
use crate::index::{DocumentIndex, IndexBackend, IndexError, Retriever};
use crate::walker::{RepoFilter, WalkOptions};

/// Host output channel for user-facing status lines.
pub trait StatusSink: Send + Sync {
    fn output(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Sends status lines to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn output(&self, message: &str) {
        info!("{}", message);
    }

    fn warning(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Options for a sync manager.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Filters for the full-repository walk
    pub walk: WalkOptions,
    /// Report per-file skips and cache recovery through the sink
    pub verbose: bool,
}

/// How [`IndexSyncManager::load_or_create`] obtained its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Restored from the cache directory.
    Restored,
    /// Nothing was persisted yet; started empty.
    Created,
    /// The cache was unusable and has been discarded.
    Recovered,
}

/// The difference between the current file set and the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub new: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl SyncPlan {
    /// Compare `current` against the documents in `index`, reading disk
    /// modification times for files present in both.
    pub async fn compute<I: DocumentIndex>(current: &BTreeSet<String>, index: &I) -> Self {
        let indexed: BTreeSet<String> = index.document_ids().await.into_iter().collect();

        let mut stored = HashMap::new();
        for id in current.intersection(&indexed) {
            if let Some(mtime) = index.modified_at(id).await {
                stored.insert(id.clone(), mtime);
            }
        }

        Self::diff(
            current,
            &indexed,
            |id| stored.get(id).copied(),
            |id| file_mtime(Path::new(id)),
        )
    }

    /// Pure set difference. A file counts as modified when its disk mtime is
    /// newer than the stored one, or when no mtime was stored for it. Files
    /// that vanished from disk are never modified.
    pub fn diff(
        current: &BTreeSet<String>,
        indexed: &BTreeSet<String>,
        stored_mtime: impl Fn(&str) -> Option<f64>,
        disk_mtime: impl Fn(&str) -> Option<f64>,
    ) -> Self {
        let new = current.difference(indexed).cloned().collect();
        let deleted = indexed.difference(current).cloned().collect();
        let modified = current
            .intersection(indexed)
            .filter(|id| match (disk_mtime(id), stored_mtime(id)) {
                (Some(now), Some(then)) => now > then,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect();

        Self {
            new,
            modified,
            deleted,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Documents to drop before re-inserting: deleted and modified.
    pub fn removals(&self) -> impl Iterator<Item = &String> {
        self.deleted.iter().chain(self.modified.iter())
    }

    /// Files to read and insert: new and modified.
    pub fn additions(&self) -> impl Iterator<Item = &String> {
        self.new.iter().chain(self.modified.iter())
    }
}

/// Result of a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    UpToDate,
    Applied {
        new: usize,
        modified: usize,
        deleted: usize,
        /// Documents actually written to the index
        inserted: usize,
        /// Unreadable, empty, or rejected files
        skipped: usize,
    },
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "Index is up to date."),
            Self::Applied {
                new,
                modified,
                deleted,
                ..
            } => write!(
                f,
                "Indexed: {} new, {} modified, {} deleted.",
                new, modified, deleted
            ),
        }
    }
}

/// Owns the index handle for one repository and keeps it in sync.
pub struct IndexSyncManager<B: IndexBackend> {
    backend: B,
    cache_dir: PathBuf,
    options: SyncOptions,
    sink: Arc<dyn StatusSink>,
    index: Option<B::Index>,
    retriever: Option<<B::Index as DocumentIndex>::Retriever>,
}

impl<B: IndexBackend> IndexSyncManager<B> {
    /// Create a manager persisting to `cache_dir`. Nothing is loaded until
    /// the first `load_or_create` or `sync`.
    pub fn new(
        backend: B,
        cache_dir: impl Into<PathBuf>,
        options: SyncOptions,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            backend,
            cache_dir: cache_dir.into(),
            options,
            sink,
            index: None,
            retriever: None,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The loaded index, if any.
    pub fn index(&self) -> Option<&B::Index> {
        self.index.as_ref()
    }

    /// Load the index persisted in `cache_dir`, or start an empty one.
    ///
    /// A cache that cannot be read is deleted and replaced; this never fails.
    pub async fn load_or_create(&mut self, cache_dir: &Path) -> LoadOutcome {
        self.cache_dir = cache_dir.to_path_buf();
        self.retriever = None;

        let (index, outcome) = match self.backend.load(&self.cache_dir).await {
            Ok(index) => {
                debug!(
                    "Loaded {} index from {:?}",
                    self.backend.name(),
                    self.cache_dir
                );
                if self.options.verbose {
                    self.sink.output("Loaded context index from cache.");
                }
                (index, LoadOutcome::Restored)
            }
            Err(e) if e.is_not_found() => {
                debug!("No cached index in {:?}, starting empty", self.cache_dir);
                (self.backend.create(), LoadOutcome::Created)
            }
            Err(e) => {
                debug!("Failed to load index from {:?}: {}", self.cache_dir, e);
                if self.options.verbose {
                    self.sink
                        .output("Failed to load index from cache, recreating...");
                }
                if let Err(e) = std::fs::remove_dir_all(&self.cache_dir) {
                    debug!("Could not remove {:?}: {}", self.cache_dir, e);
                }
                (self.backend.create(), LoadOutcome::Recovered)
            }
        };

        self.index = Some(index);
        outcome
    }

    /// Bring the index in line with `files`, or with a full walk of
    /// `repo_root` when `files` is empty.
    pub async fn sync(
        &mut self,
        files: &[PathBuf],
        repo_root: &Path,
    ) -> Result<SyncReport, IndexError> {
        if self.index.is_none() {
            let cache_dir = self.cache_dir.clone();
            self.load_or_create(&cache_dir).await;
        }

        let current = if files.is_empty() {
            let filter = RepoFilter::new(repo_root, self.options.walk.clone())?;
            let walked = filter.walk();
            debug!("Walked {} indexable files under {:?}", walked.len(), repo_root);
            to_ids(&walked, repo_root)
        } else {
            to_ids(files, repo_root)
        };

        let index = self.index.get_or_insert_with(|| self.backend.create());
        let plan = SyncPlan::compute(&current, &*index).await;

        if plan.is_empty() {
            let report = SyncReport::UpToDate;
            self.sink.output(&report.to_string());
            return Ok(report);
        }

        debug!(
            "Sync plan: {} new, {} modified, {} deleted",
            plan.new.len(),
            plan.modified.len(),
            plan.deleted.len()
        );

        for id in plan.removals() {
            if let Err(e) = index.delete(id).await {
                warn!("Failed to remove {} from index: {}", id, e);
            }
        }

        let mut inserted = 0;
        let mut skipped = 0;
        for id in plan.additions() {
            let path = Path::new(id);
            let text = match std::fs::read_to_string(path) {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => {
                    debug!("Skipping empty file {}", id);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    debug!("Failed to read {}: {}", id, e);
                    if self.options.verbose {
                        self.sink
                            .warning(&format!("Skipping unreadable file {}: {}", id, e));
                    }
                    skipped += 1;
                    continue;
                }
            };

            let mtime = file_mtime(path).unwrap_or_default();
            let doc = TrackedDocument::new(path, repo_root, text, mtime);
            match index.insert(doc).await {
                Ok(chunks) => {
                    debug!("Indexed {} ({} chunks)", id, chunks);
                    inserted += 1;
                }
                Err(e) => {
                    debug!("Failed to index {}: {}", id, e);
                    if self.options.verbose {
                        self.sink
                            .warning(&format!("Failed to index {}: {}", id, e));
                    }
                    skipped += 1;
                }
            }
        }

        index.persist(&self.cache_dir).await?;

        let report = SyncReport::Applied {
            new: plan.new.len(),
            modified: plan.modified.len(),
            deleted: plan.deleted.len(),
            inserted,
            skipped,
        };
        self.sink.output(&report.to_string());
        Ok(report)
    }

    /// Retrieve up to `top_k` matches for `text`. Without a loaded index the
    /// result is empty.
    pub async fn query(
        &mut self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<ContextMatch>, IndexError> {
        let Some(index) = self.index.as_ref() else {
            return Ok(Vec::new());
        };

        if self.retriever.as_ref().map_or(true, |r| r.top_k() != top_k) {
            debug!("Building retriever with top_k={}", top_k);
            self.retriever = Some(index.as_retriever(top_k));
        }

        match &self.retriever {
            Some(retriever) => retriever.retrieve(text).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Absolute path strings for `files`, relative entries resolved against `root`.
fn to_ids(files: &[PathBuf], root: &Path) -> BTreeSet<String> {
    files
        .iter()
        .map(|f| {
            if f.is_absolute() {
                f.to_string_lossy().into_owned()
            } else {
                root.join(f).to_string_lossy().into_owned()
            }
        })
        .collect()
}
