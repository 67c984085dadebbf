//! # Exact Index (Brute-Force Search)
//!
//! The index that searches everything. Used for:
//! 1. Exact top-k retrieval (100% recall)
//! 2. Small collections where approximate structures aren't worth it
//! 3. Ground truth when measuring the approximate indexes
//!
//! ## Architecture
//! - Entries stored in insertion order, each vector unit-normalized on `add`
//! - Cosine similarity therefore reduces to a dot product at query time
//! - Search: O(n) dot products, top-k kept in a `BoundedHeap`, O(n log k)

use rayon::prelude::*;

use vsearch_core::error::{ensure_dimension, Result};
use vsearch_core::types::{compare_relevance, Entry, SearchResult, Vector};

use crate::simd::VectorMath;
use crate::topk::BoundedHeap;

/// Exact nearest neighbor index over unit-normalized vectors
#[derive(Debug, Clone)]
pub struct ExactIndex<T> {
    pub(crate) entries: Vec<Entry<T>>,
    /// Fixed by the first vector unless set up front
    pub(crate) dimension: Option<usize>,
    math: VectorMath,
}

impl<T> Default for ExactIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExactIndex<T> {
    /// Create new exact index; dimension is taken from the first vector
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            dimension: None,
            math: *VectorMath::global(),
        }
    }

    /// Create an index that only accepts `dimension`-long vectors
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::new()
        }
    }

    /// Create with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Use specific kernels instead of the process-wide ones
    pub fn with_math(mut self, math: VectorMath) -> Self {
        self.math = math;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, once known
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Entry<T>> {
        self.entries.get(index)
    }

    /// Normalize `vector` to unit length and append it.
    ///
    /// A zero vector is stored unchanged and scores 0 against any query.
    pub fn add(&mut self, mut vector: Vector, payload: T) -> Result<()> {
        match self.dimension {
            Some(dim) => ensure_dimension(dim, vector.len())?,
            None => self.dimension = Some(vector.len()),
        }

        self.math.normalize(&mut vector);
        self.entries.push(Entry::new(vector, payload));
        Ok(())
    }

    /// Drop all entries, keeping the configured dimension
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> ExactIndex<T> {
    /// Top-`k` entries by cosine similarity, most relevant first.
    ///
    /// The query is normalized in place. `k == 0` yields an empty list
    /// before any other check; an empty index does too. Scores that come
    /// out NaN rank below every real score.
    pub fn search(&self, query: &mut [f32], k: usize) -> Result<Vec<SearchResult<T>>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        if let Some(dim) = self.dimension {
            ensure_dimension(dim, query.len())?;
        }

        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        self.math.normalize(query);

        let mut heap = BoundedHeap::new(k.min(self.entries.len()), |a: &(f64, usize), b: &(f64, usize)| {
            compare_relevance(a.0, b.0)
        });

        for (i, entry) in self.entries.iter().enumerate() {
            let relevance = self.math.dot(query, &entry.vector);
            heap.push((relevance, i));
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|(relevance, i)| SearchResult::new(relevance, self.entries[i].payload.clone()))
            .collect())
    }
}

impl<T: Clone + Send + Sync> ExactIndex<T> {
    /// Run independent searches in parallel; each query is normalized in
    /// place. Results are in query order.
    pub fn search_batch(&self, queries: &mut [Vector], k: usize) -> Result<Vec<Vec<SearchResult<T>>>> {
        queries
            .par_iter_mut()
            .map(|query| self.search(query, k))
            .collect()
    }
}
