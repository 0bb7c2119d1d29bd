//! Wiring between configuration and the context index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use seek_config::{Backend, DiscoverConfig};
use seek_index::{
    cache_dir_for, repo_hash, ContextMatch, IndexError, IndexSyncManager, LoadOutcome,
    LocalBackend, OpenRouterEmbeddings, QdrantBackend, QdrantClient, QdrantConfig,
    SplitterConfig, StatusSink, SyncOptions, SyncReport, TextSplitter, WalkOptions,
};
use tokio::process::Command;
use tracing::debug;

/// Find the git repository root containing `from`, or `from` itself when it
/// is not inside a repository.
pub async fn find_repo_root(from: &Path) -> PathBuf {
    let output = Command::new("git")
        .args(["-C", &from.to_string_lossy(), "rev-parse", "--show-toplevel"])
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if root.is_empty() {
                from.to_path_buf()
            } else {
                PathBuf::from(root)
            }
        }
        Ok(output) => {
            debug!(
                "Not a git repository ({}), using {:?}",
                String::from_utf8_lossy(&output.stderr).trim(),
                from
            );
            from.to_path_buf()
        }
        Err(e) => {
            debug!("Failed to run git: {}", e);
            from.to_path_buf()
        }
    }
}

/// Qdrant collection for a repository: `<prefix>-<first 12 hex of md5(root)>`.
pub fn collection_name(prefix: &str, repo_root: &Path) -> String {
    format!("{}-{}", prefix, &repo_hash(repo_root)[..12])
}

pub fn walk_options(config: &DiscoverConfig) -> WalkOptions {
    WalkOptions {
        ignore_file: config.ignore_file.clone(),
        max_file_bytes: config.max_file_bytes,
        binary_sniff_bytes: config.binary_sniff_bytes,
        respect_gitignore: config.respect_gitignore,
    }
}

/// Sync manager over whichever backend the configuration selects.
pub enum ContextIndex {
    Local(IndexSyncManager<LocalBackend>),
    Qdrant(IndexSyncManager<QdrantBackend<OpenRouterEmbeddings>>),
}

impl ContextIndex {
    /// Build the manager for `repo_root`. Fails before touching any index
    /// when the selected backend is missing what it needs.
    pub fn from_config(
        config: &DiscoverConfig,
        repo_root: &Path,
        sink: Arc<dyn StatusSink>,
    ) -> Result<Self> {
        let cache_root = config
            .cache_root_path()
            .context("Cannot determine the index cache directory")?;
        let cache_dir = cache_dir_for(&cache_root, repo_root);
        let options = SyncOptions {
            walk: walk_options(config),
            verbose: config.verbose,
        };
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
        })?;

        debug!("Using {:?} backend, cache {:?}", config.backend, cache_dir);

        match config.backend {
            Backend::Local => Ok(Self::Local(IndexSyncManager::new(
                LocalBackend::new(splitter),
                cache_dir,
                options,
                sink,
            ))),
            Backend::Qdrant => {
                let api_key = config.embeddings.resolve_api_key().context(
                    "The qdrant backend needs an embeddings API key; set backend = \"local\" to index offline",
                )?;
                let mut embeddings = OpenRouterEmbeddings::new(
                    api_key,
                    Some(config.embeddings.model.clone()),
                    Some(config.embeddings.dimensions),
                );
                if let Some(url) = &config.embeddings.base_url {
                    embeddings = embeddings.with_base_url(url.clone());
                }

                let client = QdrantClient::from_config(&QdrantConfig {
                    url: config.qdrant.url.clone(),
                    api_key: config.qdrant.api_key.clone(),
                    collection_name: collection_name(&config.qdrant.collection_prefix, repo_root),
                    dimensions: config.embeddings.dimensions,
                })?;

                Ok(Self::Qdrant(IndexSyncManager::new(
                    QdrantBackend::new(client, Arc::new(embeddings), splitter),
                    cache_dir,
                    options,
                    sink,
                )))
            }
        }
    }

    pub fn cache_dir(&self) -> &Path {
        match self {
            Self::Local(m) => m.cache_dir(),
            Self::Qdrant(m) => m.cache_dir(),
        }
    }

    pub async fn load_or_create(&mut self) -> LoadOutcome {
        let cache_dir = self.cache_dir().to_path_buf();
        match self {
            Self::Local(m) => m.load_or_create(&cache_dir).await,
            Self::Qdrant(m) => m.load_or_create(&cache_dir).await,
        }
    }

    pub async fn sync(
        &mut self,
        files: &[PathBuf],
        repo_root: &Path,
    ) -> Result<SyncReport, IndexError> {
        match self {
            Self::Local(m) => m.sync(files, repo_root).await,
            Self::Qdrant(m) => m.sync(files, repo_root).await,
        }
    }

    pub async fn query(&mut self, text: &str, top_k: usize) -> Result<Vec<ContextMatch>, IndexError> {
        match self {
            Self::Local(m) => m.query(text, top_k).await,
            Self::Qdrant(m) => m.query(text, top_k).await,
        }
    }
}

/// Human-readable rendering of query matches.
pub fn format_matches(matches: &[ContextMatch]) -> String {
    if matches.is_empty() {
        return "No matching context found.\n".to_string();
    }

    let mut out = String::new();
    for m in matches {
        out.push_str(&format!(
            "{}:{}-{} (score {:.3})\n",
            m.file, m.line_start, m.line_end, m.score
        ));
        for line in m.text.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
