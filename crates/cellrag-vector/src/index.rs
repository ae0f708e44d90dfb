//! Flat in-memory cosine index.
//!
//! Vectors are kept in insertion order next to the segments they were computed
//! from. Search is exhaustive, which is fine at the size of a single user's
//! document collection and keeps ranking exact.

use std::cmp::Ordering;

use cellrag_core::error::{Error, Result};
use cellrag_core::traits::Embedder;
use cellrag_core::types::{ScoredSegment, Segment};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dim: Option<usize>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    segments: Vec<Segment>,
}

impl VectorIndex {
    pub fn new() -> Self { Self::default() }

    /// Rebuild an index from stored parts, applying the same checks as [`insert`](Self::insert).
    pub fn from_parts(vectors: Vec<Vec<f32>>, segments: Vec<Segment>) -> Result<Self> {
        let mut index = Self::new();
        index.insert(vectors, segments)?;
        Ok(index)
    }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    /// Fixed by the first insertion; `None` while empty.
    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    pub fn vectors(&self) -> &[Vec<f32>] { &self.vectors }

    /// Append a batch. The whole batch is rejected if any vector has the wrong
    /// dimension or the counts differ.
    pub fn insert(&mut self, vectors: Vec<Vec<f32>>, segments: Vec<Segment>) -> Result<()> {
        if vectors.len() != segments.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), segments: segments.len() });
        }
        let Some(first) = vectors.first() else { return Ok(()) };
        let expected = self.dim.unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(Error::DimensionMismatch { expected, actual: bad.len() });
        }
        if expected == 0 {
            return Err(Error::DimensionMismatch { expected: 1, actual: 0 });
        }

        self.dim = Some(expected);
        self.norms.extend(vectors.iter().map(|v| l2_norm(v)));
        self.vectors.extend(vectors);
        self.segments.extend(segments);
        debug!("Index now holds {} vectors (dim {})", self.len(), expected);
        Ok(())
    }

    /// Embed `segments` with `embedder` and insert them. Returns the number inserted.
    pub fn embed_and_insert(&mut self, embedder: &dyn Embedder, segments: Vec<Segment>) -> Result<usize> {
        if segments.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        let count = segments.len();
        self.insert(vectors, segments)?;
        Ok(count)
    }

    /// Top `k` segments by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>> {
        let Some(dim) = self.dim.filter(|_| !self.is_empty()) else {
            return Err(Error::EmptyIndex);
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .zip(&self.norms)
            .map(|(v, &norm)| cosine(query, query_norm, v, norm))
            .enumerate()
            .collect();
        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredSegment { segment: self.segments[i].clone(), score })
            .collect())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn l2_norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let score = dot / (a_norm * b_norm);
    if score.is_nan() { 0.0 } else { score }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], 0.0, &[1.0, 0.0], 1.0), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let a = [3.0, 4.0];
        let b = [6.0, 8.0];
        assert!((cosine(&a, l2_norm(&a), &b, l2_norm(&b)) - 1.0).abs() < 1e-6);
    }
}
