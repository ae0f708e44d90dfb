//! Embedding backends for cellrag.
//!
//! [`HashEmbedder`] needs nothing on disk; [`EmbeddingModel`] runs a local
//! XLM-RoBERTa checkpoint through candle.

mod device;
mod hash;
mod model;
mod pool;
mod tokenize;

use std::path::PathBuf;

use cellrag_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use cellrag_core::error::{Error, Result};
use cellrag_core::traits::Embedder;
use tracing::info;

pub use device::select_device;
pub use hash::HashEmbedder;
pub use model::EmbeddingModel;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

/// Build the embedder selected by `settings.backend`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    match settings.backend {
        EmbeddingBackend::Hash => {
            info!("Using hash embedder (dim {})", settings.dim);
            Ok(Box::new(HashEmbedder::new(settings.dim)?))
        }
        EmbeddingBackend::Model => {
            let dir = resolve_model_dir(settings)?;
            Ok(Box::new(EmbeddingModel::load(&dir, settings.max_len)?))
        }
    }
}

/// The configured `model_dir`, falling back to `MODEL_DIR` from the environment.
pub fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    let candidates = settings
        .model_dir
        .iter()
        .cloned()
        .chain(std::env::var("MODEL_DIR").ok())
        .map(expand_path);
    let mut tried = Vec::new();
    for dir in candidates {
        if dir.is_dir() {
            info!("Using model dir: {}", dir.display());
            return Ok(dir);
        }
        tried.push(dir.display().to_string());
    }
    Err(Error::EmbeddingUnavailable(format!("could not locate model directory (tried: [{}])", tried.join(", "))))
}
