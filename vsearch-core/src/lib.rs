//! # vsearch Core
//!
//! Shared building blocks for the vsearch indexes:
//! - Error types
//! - Construction configuration
//! - Vector / entry / result types
//! - Collaborator traits (embedding models)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  vsearch-core                   │
//! ├─────────────────────────────────────────────────┤
//! │  • error   - Typed failures                     │
//! │  • config  - Index construction options         │
//! │  • types   - Vector, Entry, SearchResult        │
//! │  • traits  - Embedder contract                  │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{Compression, Config, GraphConfig, LshConfig, PersistenceConfig};
pub use error::{Error, Result};
pub use traits::Embedder;
pub use types::{compare_relevance, Entry, SearchResult, Vector};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
