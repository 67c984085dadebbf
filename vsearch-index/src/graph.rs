//! # Proximity Graph Index
//!
//! Single-layer neighbor graph over unit-normalized vectors.
//!
//! ## Build Process
//!
//! ```text
//! for node in insertion order:
//!   1. normalize node's vector in place
//!   2. linear scan: M nearest other nodes by cosine distance
//!   3. node.neighbors = those M (drops back-edges received earlier)
//!   4. for each neighbor n: if |n.neighbors| < M and node ∉ n.neighbors,
//!      add the back-edge n → node
//! ```
//!
//! Distances involving a vector that is not unit length count as maximal
//! (1.0). Nodes later in insertion order have not been normalized yet when
//! an earlier node scans them, so the graph is asymmetric and depends on
//! insertion order.
//!
//! ## Search
//!
//! Linear scan over every node, nearest first. The edges are built and
//! exposed through `neighbors()` but are not walked by `search`.

use std::cmp::Ordering;

use tracing::{info, warn};

use vsearch_core::config::GraphConfig;
use vsearch_core::error::{ensure_dimension, Error, Result};

use crate::simd::VectorMath;
use crate::topk::BoundedHeap;

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Node index, in insertion order
    pub node: usize,
    /// Cosine distance, 0 = same direction
    pub distance: f32,
}

/// Accumulates nodes before the graph is wired
pub struct GraphBuilder {
    config: GraphConfig,
    vectors: Vec<Vec<f32>>,
    dimension: Option<usize>,
    math: VectorMath,
}

impl GraphBuilder {
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            vectors: Vec::new(),
            dimension: None,
            math: *VectorMath::global(),
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Store `vector` as a new node and return its index. The vector is
    /// normalized during `build`, not here.
    pub fn add_node(&mut self, vector: Vec<f32>) -> Result<usize> {
        match self.dimension {
            Some(dim) => ensure_dimension(dim, vector.len())?,
            None => self.dimension = Some(vector.len()),
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Wire the neighbor lists and freeze the graph
    pub fn build(self) -> GraphIndex {
        let Self {
            config,
            mut vectors,
            dimension,
            math,
        } = self;
        let m = config.max_neighbors;
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); vectors.len()];

        for node in 0..vectors.len() {
            if !math.normalize(&mut vectors[node]) {
                warn!("Graph node {} has a zero vector; it stays unnormalized", node);
            }

            let mut nearest = BoundedHeap::new(m, by_distance);
            for (other, vector) in vectors.iter().enumerate() {
                if other != node {
                    nearest.push(Neighbor {
                        node: other,
                        distance: cosine_distance(&math, &vectors[node], vector),
                    });
                }
            }

            let chosen: Vec<usize> = nearest.into_sorted_vec().into_iter().map(|n| n.node).collect();
            for &n in &chosen {
                let back = &mut neighbors[n];
                if back.len() < m && !back.contains(&node) {
                    back.push(node);
                }
            }
            neighbors[node] = chosen;
        }

        let edges: usize = neighbors.iter().map(Vec::len).sum();
        info!("Graph built: {} nodes, {} edges (M={})", vectors.len(), edges, m);

        GraphIndex {
            config,
            vectors,
            neighbors,
            dimension,
            math,
        }
    }
}

/// Built, read-only graph index
#[derive(Debug, Clone)]
pub struct GraphIndex {
    config: GraphConfig,
    vectors: Vec<Vec<f32>>,
    neighbors: Vec<Vec<usize>>,
    dimension: Option<usize>,
    math: VectorMath,
}

impl GraphIndex {
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Neighbor list of `node`, nearest first as chosen at build time, with
    /// any back-edges appended
    pub fn neighbors(&self, node: usize) -> Option<&[usize]> {
        self.neighbors.get(node).map(Vec::as_slice)
    }

    /// Stored (normalized) vector of `node`
    pub fn vector(&self, node: usize) -> Option<&[f32]> {
        self.vectors.get(node).map(Vec::as_slice)
    }

    /// The `k` nearest nodes to `query`, nearest first. The query is
    /// normalized in place.
    pub fn search(&self, query: &mut [f32], k: usize) -> Result<Vec<Neighbor>> {
        if !self.math.normalize(query) {
            return Err(Error::ZeroVector);
        }
        let dim = self.dimension.ok_or(Error::EmptyIndex)?;
        ensure_dimension(dim, query.len())?;

        let mut heap = BoundedHeap::new(k.min(self.vectors.len()), by_distance);
        for (node, vector) in self.vectors.iter().enumerate() {
            heap.push(Neighbor {
                node,
                distance: cosine_distance(&self.math, query, vector),
            });
        }

        Ok(heap.into_sorted_vec())
    }
}

/// Closer is more relevant
fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.distance.partial_cmp(&a.distance).unwrap_or(Ordering::Equal)
}

/// `1 - dot(a, b)` for unit vectors; 1.0 when lengths differ or either
/// vector is off the unit sphere
fn cosine_distance(math: &VectorMath, a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || !math.is_unit(a) || !math.is_unit(b) {
        return 1.0;
    }
    (1.0 - math.dot(a, b)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn config(m: usize) -> GraphConfig {
        GraphConfig {
            max_neighbors: m,
            ef_search: 64,
        }
    }

    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    fn build(vectors: &[Vec<f32>], m: usize) -> GraphIndex {
        let mut builder = GraphBuilder::new(config(m)).unwrap();
        for v in vectors {
            builder.add_node(v.clone()).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_neighbor_lists_bounded() {
        let index = build(&random_vectors(100, 8, 1), 4);
        for node in 0..index.len() {
            let list = index.neighbors(node).unwrap();
            assert!(list.len() <= 4);
            assert!(!list.contains(&node));
        }
    }

    #[test]
    fn test_two_nodes_link_each_other() {
        let index = build(&[vec![1.0, 0.0], vec![0.0, 3.0]], 1);
        assert_eq!(index.neighbors(0).unwrap(), &[1]);
        assert_eq!(index.neighbors(1).unwrap(), &[0]);
    }

    #[test]
    fn test_back_edges_depend_on_insertion_order() {
        // Node 0 scans before 1 and 2 are normalized, so both look 1.0 away
        // and the first seen is kept. With M = 1 every list is full after
        // its first edge, so 2 -> 1 gets no back-edge.
        let index = build(&[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.1, 0.9]], 1);
        assert_eq!(index.neighbors(0).unwrap(), &[1]);
        assert_eq!(index.neighbors(1).unwrap(), &[0]);
        assert_eq!(index.neighbors(2).unwrap(), &[1]);
        assert!(!index.neighbors(1).unwrap().contains(&2));
    }

    #[test]
    fn test_back_edge_replaced_by_own_scan() {
        // 2 collects back-edges [0, 1] from the earlier scans, then its own
        // scan replaces them, nearest first
        let index = build(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]], 2);
        assert_eq!(index.neighbors(0).unwrap(), &[2, 1]);
        assert_eq!(index.neighbors(1).unwrap(), &[2, 0]);
        assert_eq!(index.neighbors(2).unwrap(), &[1, 0]);
    }

    #[test]
    fn test_build_normalizes() {
        let index = build(&[vec![3.0, 4.0], vec![0.0, 0.0]], 2);
        let v = index.vector(0).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(index.vector(1).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_search_errors() {
        let empty = GraphBuilder::new(config(4)).unwrap().build();
        assert!(matches!(empty.search(&mut [1.0, 0.0], 1), Err(Error::EmptyIndex)));
        assert!(matches!(empty.search(&mut [0.0, 0.0], 1), Err(Error::ZeroVector)));

        let index = build(&[vec![1.0, 0.0]], 4);
        assert!(matches!(index.search(&mut [0.0, 0.0], 1), Err(Error::ZeroVector)));
        assert!(matches!(
            index.search(&mut [1.0, 0.0, 0.0], 1),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_search_exact_match_first() {
        let vectors = random_vectors(50, 16, 2);
        let index = build(&vectors, 8);

        let mut query = vectors[17].clone();
        let results = index.search(&mut query, 5).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].node, 17);
        assert!(results[0].distance.abs() < 1e-4);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_k_larger_than_graph() {
        let index = build(&random_vectors(3, 4, 3), 2);
        assert_eq!(index.search(&mut [1.0, 1.0, 1.0, 1.0], 10).unwrap().len(), 3);
        assert!(index.search(&mut [1.0, 1.0, 1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(GraphBuilder::new(config(0)).is_err());
    }

    #[test]
    fn test_cosine_distance_guard() {
        let math = VectorMath::scalar();
        assert_eq!(cosine_distance(&math, &[2.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&math, &[1.0, 0.0], &[1.0, 0.0, 0.0]), 1.0);
        assert!(cosine_distance(&math, &[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&math, &[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }
}
