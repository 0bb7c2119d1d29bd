//! Interfaces between the sync manager and a concrete index library.
//!
//! The sync manager only decides *what* changes; chunking, embedding,
//! search and the on-disk format belong to the backend behind these traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::document::{ContextMatch, TrackedDocument};
use crate::manifest::ManifestError;
use crate::walker::WalkError;

/// Errors raised by index backends.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("Failed to parse index data: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to serialize index data: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unsupported index format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid splitter configuration: {0}")]
    Splitter(String),
}

impl IndexError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this is a missing-file error, i.e. nothing was persisted yet.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Manifest(ManifestError::Io(e)) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Factory for index handles: restores one from a cache directory or
/// creates an empty one.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    type Index: DocumentIndex;

    /// Load a previously persisted index from `dir`.
    async fn load(&self, dir: &Path) -> Result<Self::Index, IndexError>;

    /// Create a fresh, empty index.
    fn create(&self) -> Self::Index;

    /// Short backend name for status output.
    fn name(&self) -> &str;
}

/// An in-memory handle to an index of whole documents.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    type Retriever: Retriever;

    /// Ids of every document currently in the index.
    async fn document_ids(&self) -> Vec<String>;

    /// Modification time recorded when the document was inserted.
    async fn modified_at(&self, id: &str) -> Option<f64>;

    /// Insert a document, returning the number of chunks stored for it.
    async fn insert(&mut self, doc: TrackedDocument) -> Result<usize, IndexError>;

    /// Remove a document and all of its chunks. Returns false if it was absent.
    async fn delete(&mut self, id: &str) -> Result<bool, IndexError>;

    /// A retrieval handle returning at most `top_k` matches per query.
    fn as_retriever(&self, top_k: usize) -> Self::Retriever;

    /// Write the index to `dir`, creating it as needed.
    async fn persist(&self, dir: &Path) -> Result<(), IndexError>;
}

/// Query side of an index.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Maximum number of matches per query.
    fn top_k(&self) -> usize;

    /// Matches ordered by descending relevance.
    async fn retrieve(&self, query: &str) -> Result<Vec<ContextMatch>, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        let err = IndexError::io(
            Path::new("/x"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = IndexError::Manifest(ManifestError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        )));
        assert!(err.is_not_found());

        let err = IndexError::Version {
            found: 2,
            expected: 1,
        };
        assert!(!err.is_not_found());
    }
}
