//! Offline index backend: BM25 keyword ranking over chunked documents,
//! persisted as a single JSON file in the cache directory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{ContextMatch, TrackedDocument};
use crate::index::{DocumentIndex, IndexBackend, IndexError, Retriever};
use crate::manifest::IndexManifest;
use crate::search::{rank_matches, BM25Index};
use crate::splitter::TextSplitter;

/// File holding the whole local index inside the cache directory.
pub const LOCAL_INDEX_FILE: &str = "local_index.json";

const LOCAL_FORMAT_VERSION: u32 = 1;

/// Where a chunk came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkSpan {
    document_id: String,
    line_start: usize,
    line_end: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalStore {
    version: u32,
    manifest: IndexManifest,
    spans: HashMap<String, ChunkSpan>,
    bm25: BM25Index,
}

impl LocalStore {
    fn new() -> Self {
        Self {
            version: LOCAL_FORMAT_VERSION,
            manifest: IndexManifest::new(),
            spans: HashMap::new(),
            bm25: BM25Index::new(),
        }
    }

    fn remove_document(&mut self, id: &str) -> bool {
        let Some(state) = self.manifest.remove_document(id) else {
            return false;
        };
        for chunk_id in &state.chunk_ids {
            self.bm25.remove(chunk_id);
            self.spans.remove(chunk_id);
        }
        true
    }
}

/// Creates and restores [`LocalIndex`] handles.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    splitter: TextSplitter,
}

impl LocalBackend {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl IndexBackend for LocalBackend {
    type Index = LocalIndex;

    async fn load(&self, dir: &Path) -> Result<LocalIndex, IndexError> {
        let path = dir.join(LOCAL_INDEX_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| IndexError::io(&path, e))?;
        let store: LocalStore = serde_json::from_str(&content).map_err(IndexError::Parse)?;

        if store.version != LOCAL_FORMAT_VERSION {
            return Err(IndexError::Version {
                found: store.version,
                expected: LOCAL_FORMAT_VERSION,
            });
        }
        store.manifest.check_version()?;

        debug!(
            "Loaded local index with {} documents, {} chunks",
            store.manifest.len(),
            store.bm25.len()
        );

        Ok(LocalIndex {
            store: Arc::new(RwLock::new(store)),
            splitter: self.splitter.clone(),
        })
    }

    fn create(&self) -> LocalIndex {
        LocalIndex {
            store: Arc::new(RwLock::new(LocalStore::new())),
            splitter: self.splitter.clone(),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory local index. Retrievers share its store, so they always see
/// the latest inserts and deletes.
pub struct LocalIndex {
    store: Arc<RwLock<LocalStore>>,
    splitter: TextSplitter,
}

impl LocalIndex {
    /// Number of chunks currently stored.
    pub async fn chunk_count(&self) -> usize {
        self.store.read().await.bm25.len()
    }
}

#[async_trait]
impl DocumentIndex for LocalIndex {
    type Retriever = LocalRetriever;

    async fn document_ids(&self) -> Vec<String> {
        self.store.read().await.manifest.document_ids()
    }

    async fn modified_at(&self, id: &str) -> Option<f64> {
        self.store.read().await.manifest.modified_at(id)
    }

    async fn insert(&mut self, doc: TrackedDocument) -> Result<usize, IndexError> {
        let chunks = self.splitter.split(&doc.text);
        let mut store = self.store.write().await;

        // Inserting an id twice replaces the old chunks
        store.remove_document(&doc.id);

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for (n, chunk) in chunks.into_iter().enumerate() {
            let chunk_id = format!("{}#{}", doc.id, n);
            store.spans.insert(
                chunk_id.clone(),
                ChunkSpan {
                    document_id: doc.id.clone(),
                    line_start: chunk.line_start,
                    line_end: chunk.line_end,
                },
            );
            store.bm25.add(chunk_id.clone(), chunk.text);
            chunk_ids.push(chunk_id);
        }

        let count = chunk_ids.len();
        store
            .manifest
            .record_indexed(doc.id, doc.relative_path, doc.modified_at, chunk_ids);
        Ok(count)
    }

    async fn delete(&mut self, id: &str) -> Result<bool, IndexError> {
        Ok(self.store.write().await.remove_document(id))
    }

    fn as_retriever(&self, top_k: usize) -> LocalRetriever {
        LocalRetriever {
            store: self.store.clone(),
            top_k,
        }
    }

    async fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

        let path = dir.join(LOCAL_INDEX_FILE);
        let store = self.store.read().await;
        let content = serde_json::to_string(&*store).map_err(IndexError::Serialize)?;
        std::fs::write(&path, content).map_err(|e| IndexError::io(&path, e))?;

        debug!("Persisted local index to {:?}", path);
        Ok(())
    }
}

/// BM25 retrieval over a [`LocalIndex`].
pub struct LocalRetriever {
    store: Arc<RwLock<LocalStore>>,
    top_k: usize,
}

#[async_trait]
impl Retriever for LocalRetriever {
    fn top_k(&self) -> usize {
        self.top_k
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<ContextMatch>, IndexError> {
        let store = self.store.read().await;

        let matches = store
            .bm25
            .search(query, self.top_k)
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let span = store.spans.get(&chunk_id)?;
                let file = store
                    .manifest
                    .relative_path(&span.document_id)
                    .unwrap_or(&span.document_id)
                    .to_string();
                Some(ContextMatch {
                    file,
                    score: score as f32,
                    text: store.bm25.text(&chunk_id).unwrap_or_default().to_string(),
                    line_start: span.line_start,
                    line_end: span.line_end,
                })
            })
            .collect();

        Ok(rank_matches(matches, self.top_k))
    }
}
