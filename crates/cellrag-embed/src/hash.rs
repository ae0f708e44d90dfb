use std::hash::Hasher;

use cellrag_core::error::{Error, Result};
use cellrag_core::traits::Embedder;
use twox_hash::XxHash64;

/// Feature-hashing embedder: every lower-cased alphanumeric token adds one to
/// the bucket `xxh64(token) % dim`, and the bag is L2-normalised.
///
/// Needs no model files, so it is the offline default and the test double.
/// Texts sharing vocabulary score higher under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("hash embedder dimension must be greater than zero".to_string()));
        }
        Ok(Self { dim, model_id: format!("hash:xxh64:d{dim}") })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_ignore_case_and_punctuation() {
        let got: Vec<String> = tokens("What is 5G? LTE-Advanced!").collect();
        assert_eq!(got, vec!["what", "is", "5g", "lte", "advanced"]);
    }

    #[test]
    fn text_without_tokens_embeds_to_zero() {
        let embedder = HashEmbedder::new(8).unwrap();
        assert!(embedder.embed_one("?! ...").iter().all(|x| *x == 0.0));
    }
}
