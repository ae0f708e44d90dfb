//! Retrieval facade: chunk, embed, index, search and persist.
//!
//! A [`Retriever`] owns one embedder, one splitter and one in-memory index,
//! plus the path its index is saved to. Hosting applications build it once and
//! share it; nothing here is process-global.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use cellrag_core::config::Settings;
use cellrag_core::data_processor::DocumentProcessor;
use cellrag_core::error::{Error, Result};
use cellrag_core::splitter::TextSplitter;
use cellrag_core::traits::Embedder;
use cellrag_core::types::{RawDocument, ScoredSegment, Segment};
use cellrag_embed::get_default_embedder;
use cellrag_vector::{store, StoreManifest, VectorIndex};

pub const DEFAULT_K: usize = 4;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    processor: DocumentProcessor,
    index: RwLock<VectorIndex>,
    store_path: PathBuf,
    embed_timeout: Option<Duration>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, splitter: TextSplitter, store_path: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            processor: DocumentProcessor::new(splitter),
            index: RwLock::new(VectorIndex::new()),
            store_path: store_path.into(),
            embed_timeout: None,
        }
    }

    /// Build from loaded configuration: embedder backend, chunking, store path and deadline.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
        let retriever = Self::new(embedder, settings.splitter()?, settings.store_path())
            .with_embed_timeout(settings.embedding.timeout_ms.map(Duration::from_millis));
        Ok(retriever)
    }

    /// Deadline for each embedder call; `None` waits indefinitely.
    pub fn with_embed_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn store_path(&self) -> &Path { &self.store_path }

    pub fn model_id(&self) -> &str { self.embedder.model_id() }

    pub fn processor(&self) -> &DocumentProcessor { &self.processor }

    pub async fn len(&self) -> usize { self.index.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.index.read().await.is_empty() }

    /// Chunk, embed and index `documents`. Returns the number of segments added.
    pub async fn add_documents(&self, documents: &[RawDocument]) -> Result<usize> {
        let segments = self.processor.process_documents(documents);
        debug!("{} documents produced {} segments", documents.len(), segments.len());
        self.add_segments(segments).await
    }

    /// Embed and index already-chunked segments. The batch becomes visible to
    /// searches all at once, or not at all if embedding or insertion fails.
    pub async fn add_segments(&self, segments: Vec<Segment>) -> Result<usize> {
        if segments.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embed(texts).await?;
        let count = segments.len();
        self.index.write().await.insert(vectors, segments)?;
        info!("Added {} segments to the index", count);
        Ok(count)
    }

    /// Load, chunk and index files in order; the first unreadable file aborts the batch.
    pub async fn ingest_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<usize> {
        let segments = self.processor.ingest_and_process(paths)?;
        self.add_segments(segments).await
    }

    pub async fn get_relevant_documents(&self, query: &str, k: usize) -> Result<Vec<Segment>> {
        let hits = self.get_relevant_documents_with_scores(query, k).await?;
        Ok(hits.into_iter().map(|h| h.segment).collect())
    }

    /// Top `k` segments for `query` with their cosine scores, best first.
    pub async fn get_relevant_documents_with_scores(&self, query: &str, k: usize) -> Result<Vec<ScoredSegment>> {
        if self.index.read().await.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let query_vector = self
            .embed(vec![query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("embedder returned no vector".to_string()))?;
        let hits = self.index.read().await.search(&query_vector, k)?;
        debug!("Query '{}' matched {} segments", query, hits.len());
        Ok(hits)
    }

    pub async fn save(&self) -> Result<StoreManifest> {
        let index = self.index.write().await;
        store::save(&index, self.embedder.model_id(), &self.store_path).await
    }

    /// Replace the in-memory index with the saved one. Returns the number of entries loaded.
    pub async fn load(&self) -> Result<usize> {
        let mut index = self.index.write().await;
        let loaded = store::load(&self.store_path, self.embedder.model_id(), self.embedder.dim()).await?;
        *index = loaded;
        Ok(index.len())
    }

    /// Like [`load`](Self::load), but a missing store is not an error.
    pub async fn load_if_present(&self) -> Result<bool> {
        match self.load().await {
            Ok(_) => Ok(true),
            Err(Error::StoreNotFound(path)) => {
                warn!("No vector store at {} yet; starting empty", path.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the saved store and empty the in-memory index. Returns whether a store existed.
    pub async fn clear(&self) -> Result<bool> {
        let mut index = self.index.write().await;
        let removed = store::clear(&self.store_path)?;
        index.clear();
        Ok(removed)
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let expected = texts.len();
        let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts));
        let joined = match self.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| Error::EmbeddingTimeout(limit))?,
            None => task.await,
        };
        let vectors = joined.map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {e}")))??;
        if vectors.len() != expected {
            return Err(Error::EmbeddingUnavailable(format!("asked for {} vectors, got {}", expected, vectors.len())));
        }
        Ok(vectors)
    }
}
