use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cellrag_core::config::Settings;
use cellrag_core::error::{Error, Result};
use cellrag_core::splitter::TextSplitter;
use cellrag_core::traits::Embedder;
use cellrag_core::types::{RawDocument, Segment, SOURCE_KEY};
use cellrag_embed::HashEmbedder;
use cellrag_retriever::{Retriever, DEFAULT_K};
use tempfile::TempDir;

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

struct SlowEmbedder(Duration);

impl Embedder for SlowEmbedder {
    fn model_id(&self) -> &str { "slow" }
    fn dim(&self) -> usize { 2 }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        std::thread::sleep(self.0);
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str { "broken" }
    fn dim(&self) -> usize { 2 }
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingUnavailable("weights missing".to_string()))
    }
}

fn hash_retriever(store: &TempDir, dim: usize) -> Retriever {
    Retriever::new(Arc::new(HashEmbedder::new(dim).unwrap()), TextSplitter::default(), store.path().join("vector_store"))
}

fn cellular_docs() -> Vec<RawDocument> {
    vec![
        RawDocument::new("5G is the fifth generation of cellular networks.").with_meta(SOURCE_KEY, "nr.txt"),
        RawDocument::new("LTE stands for Long Term Evolution.").with_meta(SOURCE_KEY, "lte.txt"),
    ]
}

#[tokio::test]
async fn most_relevant_segment_comes_first() {
    let tmp = TempDir::new().unwrap();
    let retriever = hash_retriever(&tmp, 1024);
    assert_eq!(retriever.add_documents(&cellular_docs()).await.unwrap(), 2);

    let docs = retriever.get_relevant_documents("What is 5G?", 1).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("5G"));
    assert_eq!(docs[0].source(), Some("nr.txt"));

    let scored = retriever.get_relevant_documents_with_scores("What is 5G?", DEFAULT_K).await.unwrap();
    assert_eq!(scored.len(), 2);
    assert!(scored[0].score > scored[1].score);
}

#[tokio::test]
async fn querying_before_any_insert_fails_without_embedding() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(CountingEmbedder { inner: HashEmbedder::new(64).unwrap(), calls: AtomicUsize::new(0) });
    let retriever = Retriever::new(embedder.clone(), TextSplitter::default(), tmp.path().join("store"));

    let err = retriever.get_relevant_documents("handover", DEFAULT_K).await.unwrap_err();
    assert!(matches!(err, Error::EmptyIndex));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_embedder_times_out() {
    let tmp = TempDir::new().unwrap();
    let retriever = Retriever::new(Arc::new(SlowEmbedder(Duration::from_millis(500))), TextSplitter::default(), tmp.path())
        .with_embed_timeout(Some(Duration::from_millis(20)));

    let err = retriever.add_segments(vec![Segment::new("beam management")]).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingTimeout(d) if d == Duration::from_millis(20)));
    assert!(retriever.is_empty().await);
}

#[tokio::test]
async fn unavailable_embedder_is_propagated_and_nothing_is_indexed() {
    let tmp = TempDir::new().unwrap();
    let retriever = Retriever::new(Arc::new(BrokenEmbedder), TextSplitter::default(), tmp.path());

    let err = retriever.add_documents(&cellular_docs()).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    assert_eq!(retriever.len().await, 0);
}

#[tokio::test]
async fn saved_index_answers_the_same_after_reload() {
    let tmp = TempDir::new().unwrap();
    let first = hash_retriever(&tmp, 1024);
    first.add_documents(&cellular_docs()).await.unwrap();
    let manifest = first.save().await.unwrap();
    assert_eq!(manifest.count, 2);
    assert_eq!(manifest.model_id, first.model_id());

    let second = hash_retriever(&tmp, 1024);
    assert_eq!(second.load().await.unwrap(), 2);

    let before = first.get_relevant_documents_with_scores("Long Term Evolution", 2).await.unwrap();
    let after = second.get_relevant_documents_with_scores("Long Term Evolution", 2).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn store_built_with_another_embedder_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let first = hash_retriever(&tmp, 1024);
    first.add_documents(&cellular_docs()).await.unwrap();
    first.save().await.unwrap();

    let other = hash_retriever(&tmp, 512);
    assert!(matches!(other.load().await, Err(Error::ModelMismatch { .. })));
    assert!(other.is_empty().await);
}

#[tokio::test]
async fn missing_store_and_clear() {
    let tmp = TempDir::new().unwrap();
    let retriever = hash_retriever(&tmp, 256);

    assert!(matches!(retriever.load().await, Err(Error::StoreNotFound(_))));
    assert!(!retriever.load_if_present().await.unwrap());
    assert!(!retriever.clear().await.unwrap());

    retriever.add_documents(&cellular_docs()).await.unwrap();
    retriever.save().await.unwrap();
    assert!(retriever.store_path().exists());

    assert!(retriever.clear().await.unwrap());
    assert!(!retriever.store_path().exists());
    assert!(retriever.is_empty().await);
    assert!(!retriever.clear().await.unwrap());
    assert!(matches!(retriever.get_relevant_documents("5G", 1).await, Err(Error::EmptyIndex)));
}

#[tokio::test]
async fn ingest_files_and_settings_construction() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir(&docs).unwrap();
    fs::write(docs.join("nr.txt"), "5G is the fifth generation of cellular networks.").unwrap();
    fs::write(docs.join("lte.txt"), "LTE stands for Long Term Evolution.").unwrap();

    let mut settings = Settings::default();
    settings.store.path = tmp.path().join("store").to_string_lossy().to_string();
    let retriever = Retriever::from_settings(&settings).unwrap();
    assert_eq!(retriever.model_id(), "hash:xxh64:d1024");

    let files = retriever.processor().collect_files(&docs);
    assert_eq!(retriever.ingest_files(&files).await.unwrap(), 2);
    let top = retriever.get_relevant_documents("What is LTE?", 1).await.unwrap();
    assert!(top[0].text.starts_with("LTE"));

    fs::write(docs.join("notes.docx"), "binary").unwrap();
    let err = retriever.ingest_files(&[docs.join("notes.docx")]).await.unwrap_err();
    assert!(err.is_format_error());
    assert_eq!(retriever.len().await, 2);
}
