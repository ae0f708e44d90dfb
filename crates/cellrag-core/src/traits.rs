use std::path::Path;

use crate::error::{Error, Result};
use crate::types::RawDocument;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model: the index ranks
/// stored vectors against freshly embedded queries and assumes both came from
/// the same function. Failures are reported as `Error::EmbeddingUnavailable`.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model family and dimension (e.g. `hash:xxh64:d1024`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("embedder returned no vector".to_string()))
    }
}

/// Reads one file into one or more raw documents (e.g. one per PDF page).
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>>;
}
