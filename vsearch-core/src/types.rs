//! # Core Data Types
//!
//! Value types shared by the index implementations.

use std::cmp::Ordering;

/// A point in embedding space
pub type Vector = Vec<f32>;

/// A stored vector paired with its caller-defined payload
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub vector: Vector,
    pub payload: T,
}

impl<T> Entry<T> {
    pub fn new(vector: Vector, payload: T) -> Self {
        Self { vector, payload }
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Query output: relevance score plus the payload of the matched entry
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<T> {
    /// Cosine similarity, nominally in [-1, 1]
    pub relevance: f64,
    pub payload: T,
}

impl<T> SearchResult<T> {
    pub fn new(relevance: f64, payload: T) -> Self {
        Self { relevance, payload }
    }

    /// Order by relevance only, see `compare_relevance`
    #[inline]
    pub fn cmp_relevance(&self, other: &Self) -> Ordering {
        compare_relevance(self.relevance, other.relevance)
    }
}

/// Total order on relevance scores with NaN least relevant.
///
/// Top-k selection evicts its least relevant item first, so a NaN score
/// never displaces a real one and always sorts last.
#[inline]
pub fn compare_relevance(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}
