//! Incremental context-discovery index for seek.
//!
//! This crate provides:
//! - A sync manager that keeps a persisted index consistent with a set of
//!   source files (new / modified / deleted detection by mtime)
//! - Repository walking with `.seekignore` support and binary detection
//! - A local BM25 index persisted in the per-repository cache directory
//! - A Qdrant-backed vector index fed by an embeddings API
//! - Line-aware text splitting for chunked indexing

pub mod cache;
pub mod document;
pub mod embeddings;
pub mod index;
pub mod local;
pub mod manifest;
pub mod qdrant;
pub mod search;
pub mod splitter;
pub mod sync;
pub mod walker;

// Re-exports
pub use cache::{cache_dir_for, repo_hash};
pub use document::{ContextMatch, TrackedDocument};
pub use embeddings::{EmbeddingProvider, OpenRouterEmbeddings};
pub use index::{DocumentIndex, IndexBackend, IndexError, Retriever};
pub use local::{LocalBackend, LocalIndex, LocalRetriever};
pub use manifest::{DocumentState, IndexManifest, ManifestError};
pub use qdrant::{QdrantBackend, QdrantClient, QdrantConfig, QdrantIndex, VectorStore};
pub use search::BM25Index;
pub use splitter::{SplitterConfig, TextChunk, TextSplitter};
pub use sync::{
    IndexSyncManager, LoadOutcome, StatusSink, SyncOptions, SyncPlan, SyncReport, TracingSink,
};
pub use walker::{RepoFilter, WalkError, WalkOptions};

/// Default embedding dimensions (Qwen3-Embedding-8B)
pub const DEFAULT_DIMENSIONS: usize = 4096;

/// Name of the repository-local ignore file.
pub const IGNORE_FILE_NAME: &str = ".seekignore";
