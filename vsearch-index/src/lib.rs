//! # vsearch Vector Index
//!
//! In-memory similarity search over dense embedding vectors.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Vector Index Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   Exact     │    │    LSH      │    │  Proximity  │     │
//! │  │   Index     │    │   Tables    │    │   Graph     │     │
//! │  │  (+codec)   │    │ (candidates)│    │  (M-bound)  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │         │                  │                  │              │
//! │         │           ┌─────────────┐           │              │
//! │         │           │ BitsetPool  │    ┌─────────────┐      │
//! │         │           └─────────────┘    │ BoundedHeap │      │
//! │         │                              └─────────────┘      │
//! │         └──────────────────┬──────────────────┘              │
//! │                            │                                 │
//! │                 SIMD Vector Math (AVX2/NEON)                 │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `simd`: capability detection and cosine/dot kernels
//! - `topk`: bounded heap for top-k selection
//! - `exact`: brute-force cosine search (ground truth)
//! - `codec`: binary index file format
//! - `lsh`: random-hyperplane LSH candidate retrieval
//! - `graph`: proximity graph construction
//! - `bitset_pool`: reusable scratch bitsets

pub mod bitset_pool;
pub mod codec;
pub mod exact;
pub mod graph;
pub mod lsh;
pub mod simd;
pub mod topk;

pub use simd::{
    capabilities, dot_product, is_unit, norm, normalize, normalized, similarity,
    Capabilities, Kernel, VectorMath,
};

pub use bitset_pool::{BitsetPool, Lease};
pub use codec::{Payload, PayloadKind, FORMAT_VERSION};
pub use exact::ExactIndex;
pub use graph::{GraphBuilder, GraphIndex, Neighbor};
pub use lsh::{estimate_params, LshIndex, LshParams};
pub use topk::BoundedHeap;

pub use vsearch_core::{Entry, Error, Result, SearchResult};
