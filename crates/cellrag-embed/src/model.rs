use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use cellrag_core::error::{Error, Result};
use cellrag_core::traits::Embedder;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const SLOW_EMBED_MS: u128 = 500;

/// XLM-RoBERTa encoder (BGE-M3 weights) loaded from a local directory holding
/// `tokenizer.json`, `config.json` and `pytorch_model.bin`.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    dim: usize,
    model_id: String,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        Self::load_inner(model_dir, max_len).map_err(unavailable)
    }

    fn load_inner(model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = select_device();
        info!("Loading embedding model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("failed to read weights {}", weights_path.display()))?
            .into_iter()
            .collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "model".to_string());
        let model_id = format!("xlm-roberta:{name}:d{dim}");
        info!("Embedding model ready: {} (max_len {})", model_id, max_len);
        Ok(Self { model, tokenizer, device, max_len, dim, model_id })
    }

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vector: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if vector.len() != self.dim {
            return Err(anyhow!("model produced {} dims, config says {}", vector.len(), self.dim));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > SLOW_EMBED_MS {
            warn!("Slow embedding: {} ms for {} chars", elapsed, text.len());
        }
        Ok(vector)
    }
}

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch of {}", texts.len());
        texts.iter().map(|t| self.embed_one(t).map_err(unavailable)).collect()
    }
}

fn unavailable(e: impl Display) -> Error { Error::EmbeddingUnavailable(e.to_string()) }
