//! # Core Traits
//!
//! Interfaces to collaborators that live outside the index crates.

use crate::error::Result;
use crate::types::Vector;

/// Turns text into fixed-dimensionality vectors.
///
/// Indexes never call an inference engine themselves; callers run an
/// implementation of this trait and feed the vectors into `add`/`search`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string
    fn embed(&self, text: &str) -> Result<Vector>;

    /// Embed multiple texts (batch for efficiency)
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Vector dimension
    fn dimension(&self) -> usize;
}

/// Embedder that returns a zero vector, for tests and pre-computed pipelines
pub struct NoOpEmbedder {
    pub dimension: usize,
}

impl NoOpEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for NoOpEmbedder {
    fn embed(&self, _text: &str) -> Result<Vector> {
        Ok(vec![0.0; self.dimension])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
