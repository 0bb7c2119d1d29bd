//! Index manifest for tracking indexed documents and their state.
//!
//! The manifest is the index's own bookkeeping: which documents it holds,
//! when each was last modified on disk, and which chunks belong to it. It is
//! persisted next to the index data so the set of indexed documents survives
//! restarts.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Manifest tracking the state of indexed documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Version of the manifest format
    pub version: u32,

    /// When the manifest was last updated
    pub last_updated: Option<SystemTime>,

    /// Map of document id (absolute path) to document state
    pub documents: HashMap<String, DocumentState>,

    /// Total number of chunks in the index
    pub total_chunks: usize,
}

/// State of an indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    /// Path relative to the repository root
    pub relative_path: String,

    /// File modification time (seconds since epoch) when indexed
    pub modified_at: f64,

    /// IDs of the chunks stored for this document
    pub chunk_ids: Vec<String>,
}

impl Default for IndexManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexManifest {
    /// Create a new empty manifest.
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            last_updated: None,
            documents: HashMap::new(),
            total_chunks: 0,
        }
    }

    /// Load manifest from a file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(ManifestError::Io)?;
        let manifest: Self = serde_json::from_str(&content).map_err(ManifestError::Parse)?;
        manifest.check_version()?;
        Ok(manifest)
    }

    /// Save manifest to a file.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)?;
        std::fs::write(path, content).map_err(ManifestError::Io)
    }

    /// Reject manifests written by an incompatible format.
    pub fn check_version(&self) -> Result<(), ManifestError> {
        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::Version {
                found: self.version,
                expected: MANIFEST_VERSION,
            });
        }
        Ok(())
    }

    /// Ids of every indexed document.
    pub fn document_ids(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    /// Stored modification time for a document.
    pub fn modified_at(&self, id: &str) -> Option<f64> {
        self.documents.get(id).map(|state| state.modified_at)
    }

    /// Display path for a document, if indexed.
    pub fn relative_path(&self, id: &str) -> Option<&str> {
        self.documents.get(id).map(|state| state.relative_path.as_str())
    }

    /// Record that a document was indexed.
    pub fn record_indexed(
        &mut self,
        id: String,
        relative_path: String,
        modified_at: f64,
        chunk_ids: Vec<String>,
    ) {
        // Subtract old count if the document was previously indexed
        if let Some(old_state) = self.documents.get(&id) {
            self.total_chunks -= old_state.chunk_ids.len();
        }
        self.total_chunks += chunk_ids.len();

        self.documents.insert(
            id,
            DocumentState {
                relative_path,
                modified_at,
                chunk_ids,
            },
        );

        self.last_updated = Some(SystemTime::now());
    }

    /// Remove a document from the manifest.
    pub fn remove_document(&mut self, id: &str) -> Option<DocumentState> {
        let state = self.documents.remove(id)?;
        self.total_chunks -= state.chunk_ids.len();
        self.last_updated = Some(SystemTime::now());
        Some(state)
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document is indexed.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Errors that can occur when working with manifests.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unsupported manifest version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}
