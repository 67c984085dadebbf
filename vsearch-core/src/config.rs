//! # Configuration Management
//!
//! Construction options for every vsearch index. All structs are plain data
//! with `Default` impls and can be loaded from any serde format.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub lsh: LshConfig,
    pub graph: GraphConfig,
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.lsh.validate()?;
        self.graph.validate()?;
        self.persistence.validate()
    }
}

/// Locality-sensitive hashing index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshConfig {
    /// Expected number of vectors
    pub capacity: usize,
    /// Vector dimension
    pub dimension: usize,
    /// Desired false-positive collision probability, 0 < p < 1
    pub collision_probability: f64,
    /// Seed for reproducible hyperplanes (random if unset)
    pub seed: Option<u64>,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            dimension: 384,
            collision_probability: 0.10,
            seed: None,
        }
    }
}

impl LshConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::configuration("capacity must be positive"));
        }
        if self.dimension == 0 {
            return Err(Error::configuration("dimensionality must be positive"));
        }
        let p = self.collision_probability;
        // Written so that NaN is rejected too
        if !(p > 0.0 && p < 1.0) {
            return Err(Error::configuration(format!(
                "invalid collision probability {}: require 0 < p < 1",
                p
            )));
        }
        Ok(())
    }
}

/// Proximity graph index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Max neighbors per node (M)
    pub max_neighbors: usize,
    /// Search width (ef); accepted but not used by the linear query path
    pub ef_search: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_neighbors: 16,
            ef_search: 64,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_neighbors == 0 {
            return Err(Error::configuration("max_neighbors must be positive"));
        }
        Ok(())
    }
}

/// Index file persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub compression: Compression,
    /// Compression level, 0-9
    pub level: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            level: 6,
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(Error::configuration(format!(
                "compression level {} out of range 0-9",
                self.level
            )));
        }
        Ok(())
    }
}

/// Stream compression applied to index files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Deflate,
}
