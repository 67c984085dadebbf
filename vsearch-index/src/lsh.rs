//! # Random-Hyperplane LSH Index
//!
//! Approximate candidate retrieval by locality-sensitive hashing.
//!
//! ## Layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  table 0:  planes[0][0..nf]  ──►  { bucket key → slots }  │
//! │  table 1:  planes[1][0..nf]  ──►  { bucket key → slots }  │
//! │  ...                                                      │
//! │  table nt-1                                               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each table owns `nf` random hyperplanes. A vector's bucket key in a table
//! packs one bit per plane (bit i set when `dot(v, plane_i) >= 0`). Vectors
//! pointing the same way share bits with high probability, so they land in
//! the same bucket in at least one table.
//!
//! Ids are interned to dense `u32` slots; buckets are roaring bitmaps of
//! slots. A query unions its buckets into a scratch bitset leased from a
//! `BitsetPool`, so parallel readers never contend on a shared visited set.
//!
//! Queries return unranked candidates. Rank them against an `ExactIndex` or
//! any other scorer.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;
use tracing::debug;

use vsearch_core::config::LshConfig;
use vsearch_core::error::{ensure_dimension, Error, Result};

use crate::bitset_pool::BitsetPool;
use crate::simd::VectorMath;

/// Upper bound on hash functions per table (one bucket key is a `u64`)
pub const MAX_HASH_FUNCTIONS: usize = 64;

/// Table layout derived from capacity, dimension and collision probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LshParams {
    /// Hyperplanes per table (nf)
    pub hash_functions: usize,
    /// Independent hash tables (nt)
    pub tables: usize,
}

/// Estimate the table layout for `capacity` vectors of dimension `dim` at
/// false-positive collision probability `p`.
///
/// ```text
/// nf = clamp(ceil(ln(1/p) * ln(dim)), 1, 64)
/// nt = max(ceil(ln(capacity) / ln(1/p)), 1)
/// ```
pub fn estimate_params(capacity: usize, dim: usize, p: f64) -> Result<LshParams> {
    if capacity == 0 {
        return Err(Error::configuration("capacity must be positive"));
    }
    if dim == 0 {
        return Err(Error::configuration("dimensionality must be positive"));
    }
    if !(p > 0.0 && p < 1.0) {
        return Err(Error::configuration(format!(
            "invalid collision probability {}: require 0 < p < 1",
            p
        )));
    }

    let inv_log = (1.0 / p).ln();
    let nf = (inv_log * (dim as f64).ln()).ceil();
    let nt = ((capacity as f64).ln() / inv_log).ceil();

    Ok(LshParams {
        hash_functions: (nf as usize).clamp(1, MAX_HASH_FUNCTIONS),
        tables: (nt as usize).max(1),
    })
}

/// LSH index mapping vectors to ids of type `T`
pub struct LshIndex<T> {
    params: LshParams,
    dimension: usize,
    /// `planes[table][function]` is one `dimension`-long hyperplane
    planes: Vec<Vec<Vec<f32>>>,
    /// One map per table from bucket key to member slots
    tables: Vec<HashMap<u64, RoaringBitmap>>,
    /// Slot → id
    ids: Vec<T>,
    /// Id → slot
    slots: HashMap<T, u32>,
    pool: Arc<BitsetPool>,
    math: VectorMath,
}

impl<T: Clone + Eq + Hash> LshIndex<T> {
    /// Build an empty index, drawing fresh hyperplanes
    pub fn new(config: &LshConfig) -> Result<Self> {
        Self::with_pool(config, Arc::new(BitsetPool::new()))
    }

    /// Build an empty index whose queries lease scratch bitsets from `pool`
    pub fn with_pool(config: &LshConfig, pool: Arc<BitsetPool>) -> Result<Self> {
        config.validate()?;
        let params = estimate_params(
            config.capacity,
            config.dimension,
            config.collision_probability,
        )?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let planes = (0..params.tables)
            .map(|_| {
                (0..params.hash_functions)
                    .map(|_| {
                        (0..config.dimension)
                            .map(|_| rng.gen_range(-1.0f32..1.0))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        debug!(
            "LSH index: dim={}, {} tables x {} hash functions",
            config.dimension, params.tables, params.hash_functions
        );

        Ok(Self {
            params,
            dimension: config.dimension,
            planes,
            tables: vec![HashMap::new(); params.tables],
            ids: Vec::new(),
            slots: HashMap::new(),
            pool,
            math: *VectorMath::global(),
        })
    }

    pub fn params(&self) -> LshParams {
        self.params
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Bucket key of `vector` in table `table`
    pub fn bucket_key(&self, vector: &[f32], table: usize) -> Result<u64> {
        ensure_dimension(self.dimension, vector.len())?;
        let planes = self.planes.get(table).ok_or_else(|| {
            Error::configuration(format!(
                "table {} out of range ({} tables)",
                table, self.params.tables
            ))
        })?;
        Ok(self.hash(vector, planes))
    }

    /// Insert `id` into the bucket `vector` hashes to in every table.
    ///
    /// Adding an id that is already present keeps a single slot for it.
    pub fn add(&mut self, vector: &[f32], id: T) -> Result<()> {
        ensure_dimension(self.dimension, vector.len())?;

        let slot = match self.slots.get(&id) {
            Some(&slot) => slot,
            None => {
                let slot = u32::try_from(self.ids.len())
                    .map_err(|_| Error::configuration("LSH index is full"))?;
                self.ids.push(id.clone());
                self.slots.insert(id, slot);
                slot
            }
        };

        for (planes, table) in self.planes.iter().zip(self.tables.iter_mut()) {
            let key = hash_with(&self.math, vector, planes);
            table.entry(key).or_default().insert(slot);
        }

        Ok(())
    }

    /// Ids sharing a bucket with `vector` in any table, deduplicated and in
    /// insertion order. No ranking is applied.
    pub fn query(&self, vector: &[f32]) -> Result<Vec<T>> {
        ensure_dimension(self.dimension, vector.len())?;

        let mut candidates = self.pool.get();
        for (planes, table) in self.planes.iter().zip(&self.tables) {
            if let Some(bucket) = table.get(&self.hash(vector, planes)) {
                *candidates |= bucket;
            }
        }

        Ok(candidates
            .iter()
            .map(|slot| self.ids[slot as usize].clone())
            .collect())
    }

    fn hash(&self, vector: &[f32], planes: &[Vec<f32>]) -> u64 {
        hash_with(&self.math, vector, planes)
    }
}

fn hash_with(math: &VectorMath, vector: &[f32], planes: &[Vec<f32>]) -> u64 {
    planes
        .iter()
        .enumerate()
        .filter(|(_, plane)| math.dot(vector, plane) >= 0.0)
        .fold(0u64, |key, (bit, _)| key | (1 << bit))
}
