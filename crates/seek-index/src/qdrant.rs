//! Qdrant-backed vector index.
//!
//! Chunks are embedded through an [`EmbeddingProvider`] and stored as points
//! in a per-repository Qdrant collection. The manifest (which points belong
//! to which document) is persisted in the cache directory; vectors live in
//! Qdrant itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{ContextMatch, TrackedDocument};
use crate::embeddings::EmbeddingProvider;
use crate::index::{DocumentIndex, IndexBackend, IndexError, Retriever};
use crate::manifest::IndexManifest;
use crate::search::rank_matches;
use crate::splitter::TextSplitter;

/// Manifest file name inside the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata stored with each vector point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointPayload {
    /// Absolute path of the source file (document id)
    pub file_path: String,

    /// Path relative to the repository root
    pub relative_path: String,

    /// File modification time when indexed
    pub modified_at: f64,

    /// Starting line number (1-indexed)
    pub line_start: usize,

    /// Ending line number (1-indexed)
    pub line_end: usize,

    /// The chunk text
    pub text: String,
}

/// Configuration for connecting to Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant server URL
    pub url: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// Collection name
    pub collection_name: String,

    /// Vector dimensions
    pub dimensions: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_name: "seek-context".to_string(),
            dimensions: crate::DEFAULT_DIMENSIONS,
        }
    }
}

/// A point to upsert into Qdrant.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A search hit result from Qdrant.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Similarity score (higher is better for cosine)
    pub score: f32,
    pub payload: PointPayload,
}

/// Point storage for one collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it doesn't exist.
    async fn ensure_collection(&self) -> Result<()>;

    /// Upsert points (vectors with payloads).
    async fn upsert_points(&self, points: Vec<Point>) -> Result<()>;

    /// Nearest neighbours of `query_vector`, best first.
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>>;

    /// Delete points by IDs.
    async fn delete_points(&self, ids: Vec<String>) -> Result<()>;

    /// Delete the entire collection.
    async fn delete_collection(&self) -> Result<()>;
}

/// Thin wrapper over the Qdrant client bound to one collection.
pub struct QdrantClient {
    client: Qdrant,
    collection_name: String,
    dimensions: usize,
}

impl QdrantClient {
    /// Create a new Qdrant client from configuration.
    pub fn from_config(config: &QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url).skip_compatibility_check();

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().context("Failed to connect to Qdrant")?;

        info!("Connected to Qdrant at {}", config.url);

        Ok(Self {
            client,
            collection_name: config.collection_name.clone(),
            dimensions: config.dimensions,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn ensure_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            debug!("Collection {} already exists", self.collection_name);
            return Ok(());
        }

        info!(
            "Creating collection: {} with {} dimensions",
            self.collection_name, self.dimensions
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name).vectors_config(
                    VectorParamsBuilder::new(self.dimensions as u64, Distance::Cosine),
                ),
            )
            .await
            .context("Failed to create collection")?;

        Ok(())
    }

    async fn upsert_points(&self, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        debug!("Upserting {} points", points.len());

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| PointStruct::new(p.id, p.vector, payload_to_qdrant_map(&p.payload)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, qdrant_points))
            .await
            .context("Failed to upsert points")?;

        Ok(())
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, query_vector, limit as u64)
                    .with_payload(true),
            )
            .await
            .context("Failed to search points")?;

        let hits: Vec<SearchHit> = results
            .result
            .into_iter()
            .map(|p| SearchHit {
                score: p.score,
                payload: qdrant_map_to_payload(&p.payload),
            })
            .collect();

        debug!("Found {} search hits", hits.len());
        Ok(hits)
    }

    async fn delete_points(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!("Deleting {} points", ids.len());

        let point_ids: Vec<_> = ids
            .into_iter()
            .map(qdrant_client::qdrant::PointId::from)
            .collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(PointsIdsList { ids: point_ids }),
            )
            .await
            .context("Failed to delete points")?;

        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        info!("Deleting collection: {}", self.collection_name);

        self.client
            .delete_collection(&self.collection_name)
            .await
            .context("Failed to delete collection")?;

        Ok(())
    }
}

/// Creates and restores [`QdrantIndex`] handles for one collection.
pub struct QdrantBackend<E: EmbeddingProvider, S: VectorStore = QdrantClient> {
    client: Arc<S>,
    embeddings: Arc<E>,
    splitter: TextSplitter,
}

impl<E: EmbeddingProvider, S: VectorStore> QdrantBackend<E, S> {
    pub fn new(client: S, embeddings: Arc<E>, splitter: TextSplitter) -> Self {
        Self {
            client: Arc::new(client),
            embeddings,
            splitter,
        }
    }

    pub fn store(&self) -> &S {
        &self.client
    }

    fn handle(&self, manifest: IndexManifest, fresh: bool) -> QdrantIndex<E, S> {
        QdrantIndex {
            client: self.client.clone(),
            embeddings: self.embeddings.clone(),
            splitter: self.splitter.clone(),
            manifest,
            reset_pending: Arc::new(AtomicBool::new(fresh)),
            collection_ready: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<E, S> IndexBackend for QdrantBackend<E, S>
where
    E: EmbeddingProvider + 'static,
    S: VectorStore + 'static,
{
    type Index = QdrantIndex<E, S>;

    async fn load(&self, dir: &Path) -> Result<QdrantIndex<E, S>, IndexError> {
        let manifest = IndexManifest::load(&dir.join(MANIFEST_FILE))?;
        debug!("Loaded manifest with {} documents", manifest.len());
        Ok(self.handle(manifest, false))
    }

    fn create(&self) -> QdrantIndex<E, S> {
        self.handle(IndexManifest::new(), true)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

/// Vector index handle. A freshly created handle drops whatever the
/// collection held before its first write, so stale points from a discarded
/// cache never resurface.
pub struct QdrantIndex<E: EmbeddingProvider, S: VectorStore = QdrantClient> {
    client: Arc<S>,
    embeddings: Arc<E>,
    splitter: TextSplitter,
    manifest: IndexManifest,
    reset_pending: Arc<AtomicBool>,
    collection_ready: AtomicBool,
}

impl<E: EmbeddingProvider, S: VectorStore> QdrantIndex<E, S> {
    async fn prepare_collection(&self) -> Result<(), IndexError> {
        if self.reset_pending.swap(false, Ordering::SeqCst) {
            // A missing collection is fine here
            self.client.delete_collection().await.ok();
            self.collection_ready.store(false, Ordering::SeqCst);
        }
        if !self.collection_ready.load(Ordering::SeqCst) {
            self.client.ensure_collection().await.map_err(vector_store_error)?;
            self.collection_ready.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn remove_points(&mut self, id: &str) -> Result<bool, IndexError> {
        let Some(chunk_ids) = self.manifest.documents.get(id).map(|s| s.chunk_ids.clone()) else {
            return Ok(false);
        };
        self.client
            .delete_points(chunk_ids)
            .await
            .map_err(vector_store_error)?;
        self.manifest.remove_document(id);
        Ok(true)
    }
}

#[async_trait]
impl<E, S> DocumentIndex for QdrantIndex<E, S>
where
    E: EmbeddingProvider + 'static,
    S: VectorStore + 'static,
{
    type Retriever = QdrantRetriever<E, S>;

    async fn document_ids(&self) -> Vec<String> {
        self.manifest.document_ids()
    }

    async fn modified_at(&self, id: &str) -> Option<f64> {
        self.manifest.modified_at(id)
    }

    async fn insert(&mut self, doc: TrackedDocument) -> Result<usize, IndexError> {
        self.prepare_collection().await?;
        self.remove_points(&doc.id).await?;

        let chunks = self.splitter.split(&doc.text);
        let batch_size = self.embeddings.max_batch_size().max(1);

        // Embed everything before the first write; a failed batch leaves no points
        let mut points = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embeddings
                .embed_batch(&texts)
                .await
                .map_err(|e| IndexError::Embedding(e.to_string()))?;

            points.extend(batch.iter().zip(vectors).map(|(chunk, vector)| Point {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: PointPayload {
                    file_path: doc.id.clone(),
                    relative_path: doc.relative_path.clone(),
                    modified_at: doc.modified_at,
                    line_start: chunk.line_start,
                    line_end: chunk.line_end,
                    text: chunk.text.clone(),
                },
            }));
        }

        let chunk_ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
        let mut sent = 0;
        for batch in points.chunks(batch_size) {
            sent += batch.len();
            if let Err(e) = self.client.upsert_points(batch.to_vec()).await {
                // Points missing from the manifest are unreachable by delete
                let written = chunk_ids[..sent].to_vec();
                if let Err(cleanup) = self.client.delete_points(written).await {
                    debug!("Failed to roll back points for {}: {:#}", doc.id, cleanup);
                }
                return Err(vector_store_error(e));
            }
        }

        let count = chunk_ids.len();
        self.manifest
            .record_indexed(doc.id, doc.relative_path, doc.modified_at, chunk_ids);
        Ok(count)
    }

    async fn delete(&mut self, id: &str) -> Result<bool, IndexError> {
        self.remove_points(id).await
    }

    fn as_retriever(&self, top_k: usize) -> QdrantRetriever<E, S> {
        QdrantRetriever {
            client: self.client.clone(),
            embeddings: self.embeddings.clone(),
            reset_pending: self.reset_pending.clone(),
            top_k,
        }
    }

    async fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        // An index persisted without any write must still not expose old points
        self.prepare_collection().await?;

        std::fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;
        self.manifest.save(&dir.join(MANIFEST_FILE))?;
        Ok(())
    }
}

/// Vector similarity retrieval over a [`QdrantIndex`].
pub struct QdrantRetriever<E: EmbeddingProvider, S: VectorStore = QdrantClient> {
    client: Arc<S>,
    embeddings: Arc<E>,
    reset_pending: Arc<AtomicBool>,
    top_k: usize,
}

#[async_trait]
impl<E, S> Retriever for QdrantRetriever<E, S>
where
    E: EmbeddingProvider + 'static,
    S: VectorStore + 'static,
{
    fn top_k(&self) -> usize {
        self.top_k
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<ContextMatch>, IndexError> {
        if self.reset_pending.load(Ordering::SeqCst) {
            // Collection still holds points from a discarded index
            return Ok(Vec::new());
        }

        let vector = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let hits = self
            .client
            .search(vector, self.top_k)
            .await
            .map_err(vector_store_error)?;

        let matches = hits.into_iter().map(hit_to_match).collect();
        Ok(rank_matches(matches, self.top_k))
    }
}

fn hit_to_match(hit: SearchHit) -> ContextMatch {
    let PointPayload {
        file_path,
        relative_path,
        line_start,
        line_end,
        text,
        ..
    } = hit.payload;

    ContextMatch {
        file: if relative_path.is_empty() {
            file_path
        } else {
            relative_path
        },
        score: hit.score,
        text,
        line_start,
        line_end,
    }
}

fn vector_store_error(e: anyhow::Error) -> IndexError {
    IndexError::VectorStore(format!("{e:#}"))
}

/// Convert PointPayload to Qdrant's HashMap<String, Value>.
fn payload_to_qdrant_map(payload: &PointPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("file_path".to_string(), Value::from(payload.file_path.clone()));
    map.insert(
        "relative_path".to_string(),
        Value::from(payload.relative_path.clone()),
    );
    map.insert("modified_at".to_string(), Value::from(payload.modified_at));
    map.insert("line_start".to_string(), Value::from(payload.line_start as i64));
    map.insert("line_end".to_string(), Value::from(payload.line_end as i64));
    map.insert("text".to_string(), Value::from(payload.text.clone()));
    map
}

/// Convert Qdrant's HashMap<String, Value> back to PointPayload.
fn qdrant_map_to_payload(map: &HashMap<String, Value>) -> PointPayload {
    PointPayload {
        file_path: extract_string(map.get("file_path")),
        relative_path: extract_string(map.get("relative_path")),
        modified_at: extract_double(map.get("modified_at")),
        line_start: extract_integer(map.get("line_start")) as usize,
        line_end: extract_integer(map.get("line_end")) as usize,
        text: extract_string(map.get("text")),
    }
}

fn extract_string(value: Option<&Value>) -> String {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

fn extract_integer(value: Option<&Value>) -> i64 {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i,
        _ => 0,
    }
}

fn extract_double(value: Option<&Value>) -> f64 {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::DoubleValue(d)) => *d,
        Some(Kind::IntegerValue(i)) => *i as f64,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::SplitterConfig;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_qdrant_config_default() {
        let config = QdrantConfig::default();
        assert_eq!(config.url, "http://localhost:6334");
        assert!(config.api_key.is_none());
        assert_eq!(config.dimensions, crate::DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = PointPayload {
            file_path: "/repo/src/lib.rs".to_string(),
            relative_path: "src/lib.rs".to_string(),
            modified_at: 1700000000.25,
            line_start: 10,
            line_end: 42,
            text: "pub fn parse() {}".to_string(),
        };

        let map = payload_to_qdrant_map(&payload);
        assert_eq!(map.len(), 6);
        assert_eq!(qdrant_map_to_payload(&map), payload);
    }

    #[test]
    fn test_extract_functions_with_empty_map() {
        let map = HashMap::new();
        assert_eq!(qdrant_map_to_payload(&map), PointPayload::default());
    }

    #[test]
    fn test_hit_to_match_prefers_relative_path() {
        let hit = SearchHit {
            score: 0.8,
            payload: PointPayload {
                file_path: "/repo/a.py".to_string(),
                relative_path: "a.py".to_string(),
                line_start: 3,
                line_end: 9,
                text: "x = 1".to_string(),
                ..Default::default()
            },
        };
        let m = hit_to_match(hit);
        assert_eq!(m.file, "a.py");
        assert_eq!((m.line_start, m.line_end), (3, 9));
        assert_eq!(m.score, 0.8);

        let bare = SearchHit {
            score: 0.1,
            payload: PointPayload {
                file_path: "/repo/b.py".to_string(),
                ..Default::default()
            },
        };
        assert_eq!(hit_to_match(bare).file, "/repo/b.py");
    }

    #[test]
    fn test_client_from_config() {
        let client = QdrantClient::from_config(&QdrantConfig {
            collection_name: "seek-test".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.collection_name(), "seek-test");
    }

    /// In-memory collection; upserts start failing after `upsert_budget` calls.
    #[derive(Default)]
    struct MemoryStore {
        points: Mutex<HashMap<String, Point>>,
        upsert_budget: Option<usize>,
        upserts: AtomicUsize,
        collection_deletes: AtomicUsize,
    }

    impl MemoryStore {
        fn files(&self) -> Vec<String> {
            let mut files: Vec<String> = self
                .points
                .lock()
                .unwrap()
                .values()
                .map(|p| p.payload.file_path.clone())
                .collect();
            files.sort();
            files
        }
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn ensure_collection(&self) -> Result<()> {
            Ok(())
        }

        async fn upsert_points(&self, points: Vec<Point>) -> Result<()> {
            let call = self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.upsert_budget.is_some_and(|budget| call >= budget) {
                anyhow::bail!("connection reset");
            }
            let mut stored = self.points.lock().unwrap();
            for point in points {
                stored.insert(point.id.clone(), point);
            }
            Ok(())
        }

        async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
            let mut hits: Vec<SearchHit> = self
                .points
                .lock()
                .unwrap()
                .values()
                .map(|p| SearchHit {
                    score: p.vector.iter().zip(&query_vector).map(|(a, b)| a * b).sum(),
                    payload: p.payload.clone(),
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(limit);
            Ok(hits)
        }

        async fn delete_points(&self, ids: Vec<String>) -> Result<()> {
            let mut stored = self.points.lock().unwrap();
            for id in ids {
                stored.remove(&id);
            }
            Ok(())
        }

        async fn delete_collection(&self) -> Result<()> {
            self.collection_deletes.fetch_add(1, Ordering::SeqCst);
            self.points.lock().unwrap().clear();
            Ok(())
        }
    }

    /// One text per batch; the `fail_on`-th call (0-based) is rate limited.
    #[derive(Default)]
    struct StubEmbeddings {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, crate::embeddings::EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(crate::embeddings::EmbeddingError::RateLimited(3));
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.contains("retry") as u8 as f32])
                .collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        fn max_batch_size(&self) -> usize {
            1
        }
    }

    fn line_splitter() -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size: 16,
            chunk_overlap: 0,
        })
        .unwrap()
    }

    fn doc(id: &str, text: &str) -> TrackedDocument {
        TrackedDocument {
            id: id.to_string(),
            relative_path: id.trim_start_matches("/repo/").to_string(),
            text: text.to_string(),
            modified_at: 1.0,
        }
    }

    const THREE_CHUNKS: &str = "alpha_00001\nbravo_00002\ncharl_00003\n";

    #[tokio::test]
    async fn test_failed_embedding_writes_no_points() {
        let backend = QdrantBackend::new(
            MemoryStore::default(),
            Arc::new(StubEmbeddings {
                fail_on: Some(1),
                ..Default::default()
            }),
            line_splitter(),
        );
        let mut index = backend.create();

        let err = index.insert(doc("/repo/a.py", THREE_CHUNKS)).await.unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert!(backend.store().files().is_empty());
        assert!(index.document_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_upsert_rolls_back_written_batches() {
        let backend = QdrantBackend::new(
            MemoryStore {
                upsert_budget: Some(2),
                ..Default::default()
            },
            Arc::new(StubEmbeddings::default()),
            line_splitter(),
        );
        let mut index = backend.create();

        let err = index.insert(doc("/repo/a.py", THREE_CHUNKS)).await.unwrap_err();
        assert!(matches!(err, IndexError::VectorStore(_)));
        assert_eq!(backend.store().upserts.load(Ordering::SeqCst), 3);
        assert!(backend.store().files().is_empty());
        assert!(index.document_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_document() {
        let backend = QdrantBackend::new(
            MemoryStore::default(),
            Arc::new(StubEmbeddings::default()),
            line_splitter(),
        );
        let mut index = backend.create();

        assert_eq!(index.insert(doc("/repo/a.py", THREE_CHUNKS)).await.unwrap(), 3);
        assert_eq!(index.insert(doc("/repo/b.py", "retry_budget\n")).await.unwrap(), 1);
        assert!(index.delete("/repo/a.py").await.unwrap());
        assert!(!index.delete("/repo/a.py").await.unwrap());

        assert_eq!(backend.store().files(), vec!["/repo/b.py".to_string()]);
        assert_eq!(index.document_ids().await, vec!["/repo/b.py".to_string()]);

        let hits = index.as_retriever(5).retrieve("retry").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "b.py");
    }

    #[tokio::test]
    async fn test_reinsert_replaces_previous_points() {
        let backend = QdrantBackend::new(
            MemoryStore::default(),
            Arc::new(StubEmbeddings::default()),
            line_splitter(),
        );
        let mut index = backend.create();

        index.insert(doc("/repo/a.py", THREE_CHUNKS)).await.unwrap();
        index.insert(doc("/repo/a.py", "alpha_00001\n")).await.unwrap();
        assert_eq!(backend.store().files(), vec!["/repo/a.py".to_string()]);
    }

    #[tokio::test]
    async fn test_fresh_index_drops_stale_collection_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = QdrantBackend::new(
            MemoryStore::default(),
            Arc::new(StubEmbeddings::default()),
            line_splitter(),
        );
        backend
            .store()
            .upsert_points(vec![Point {
                id: "stale".to_string(),
                vector: vec![1.0, 1.0],
                payload: PointPayload {
                    file_path: "/repo/old.py".to_string(),
                    ..Default::default()
                },
            }])
            .await
            .unwrap();

        let mut index = backend.create();
        assert!(index.as_retriever(3).retrieve("old").await.unwrap().is_empty());

        index.insert(doc("/repo/a.py", "alpha_00001\n")).await.unwrap();
        index.insert(doc("/repo/b.py", "bravo_00002\n")).await.unwrap();
        index.persist(dir.path()).await.unwrap();
        assert_eq!(backend.store().collection_deletes.load(Ordering::SeqCst), 1);
        assert!(!backend.store().files().contains(&"/repo/old.py".to_string()));

        let restored = backend.load(dir.path()).await.unwrap();
        restored.persist(dir.path()).await.unwrap();
        assert_eq!(backend.store().collection_deletes.load(Ordering::SeqCst), 1);
        assert_eq!(restored.document_ids().await.len(), 2);
    }

    /// Requires a running Qdrant at localhost:6334.
    /// Run with: cargo test -p seek-index test_qdrant_index_integration -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_qdrant_index_integration() {
        struct ConstantEmbeddings;

        #[async_trait]
        impl EmbeddingProvider for ConstantEmbeddings {
            async fn embed_batch(
                &self,
                texts: &[String],
            ) -> Result<Vec<Vec<f32>>, crate::embeddings::EmbeddingError> {
                Ok(texts.iter().map(|_| vec![0.5; 8]).collect())
            }

            fn dimensions(&self) -> usize {
                8
            }

            fn model_name(&self) -> &str {
                "constant"
            }
        }

        let client = QdrantClient::from_config(&QdrantConfig {
            collection_name: "seek-integration-test".to_string(),
            dimensions: 8,
            ..Default::default()
        })
        .unwrap();
        let backend = QdrantBackend::new(client, Arc::new(ConstantEmbeddings), TextSplitter::default());

        let mut index = backend.create();
        let chunks = index
            .insert(TrackedDocument {
                id: "/repo/a.py".to_string(),
                relative_path: "a.py".to_string(),
                text: "print('hello')\n".to_string(),
                modified_at: 1.0,
            })
            .await
            .unwrap();
        assert_eq!(chunks, 1);

        let hits = index.as_retriever(3).retrieve("hello").await.unwrap();
        assert_eq!(hits[0].file, "a.py");

        assert!(index.delete("/repo/a.py").await.unwrap());
        backend.client.delete_collection().await.unwrap();
    }
}
