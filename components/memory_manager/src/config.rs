//! Nursery configuration.
//!
//! Sizes and limits for the nursery, the general heap and the tenured heap.
//! A configuration can be built in code or loaded from JSON; either way it is
//! validated before the nursery is reserved.

use core_types::{GcError, GcResult, CELL_ALIGNMENT};
use serde::{Deserialize, Serialize};

/// Promotion rate above which the nursery doubles its active chunks.
pub const GROW_THRESHOLD: f64 = 0.5;

/// Promotion rate below which the nursery gives back one active chunk.
pub const SHRINK_THRESHOLD: f64 = 0.1;

/// Smallest chunk size accepted by [`NurseryConfig::validate`].
pub const MIN_CHUNK_SIZE: usize = 256;

/// Configuration for the nursery and its collaborators.
///
/// # Example
///
/// ```
/// use memory_manager::NurseryConfig;
///
/// let config = NurseryConfig::from_json(r#"{ "chunk_size": 4096, "max_chunks": 4 }"#).unwrap();
/// assert_eq!(config.chunk_size, 4096);
/// assert_eq!(config.max_nursery_slots, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NurseryConfig {
    /// Size of each nursery chunk in bytes (power of two)
    pub chunk_size: usize,
    /// Number of chunks reserved up front
    pub max_chunks: usize,
    /// Largest slot count allocated inline in the nursery
    pub max_nursery_slots: usize,
    /// Number of edges the store buffer holds before overflowing
    pub store_buffer_capacity: usize,
    /// Tenured heap usage above which the nursery is disabled
    pub max_tenured_bytes: usize,
    /// Optional cap on general-heap bytes
    pub malloc_limit: Option<usize>,
    /// Optional cap on the number of tenured cells
    pub tenured_capacity: Option<usize>,
}

impl Default for NurseryConfig {
    fn default() -> Self {
        NurseryConfig {
            chunk_size: 1024 * 1024,
            max_chunks: 16,
            max_nursery_slots: 128,
            store_buffer_capacity: 4096,
            max_tenured_bytes: 256 * 1024 * 1024,
            malloc_limit: None,
            tenured_capacity: None,
        }
    }
}

impl NurseryConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> GcResult<Self> {
        let config: NurseryConfig =
            serde_json::from_str(json).map_err(|e| GcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to JSON.
    pub fn to_json(&self) -> GcResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| GcError::InvalidConfig(e.to_string()))
    }

    /// Checks that the configuration describes a usable nursery.
    pub fn validate(&self) -> GcResult<()> {
        if self.max_chunks == 0 {
            return Err(GcError::InvalidConfig(
                "max_chunks must be at least 1".to_string(),
            ));
        }
        if !self.chunk_size.is_power_of_two() || self.chunk_size < MIN_CHUNK_SIZE {
            return Err(GcError::InvalidConfig(format!(
                "chunk_size {} must be a power of two of at least {} bytes",
                self.chunk_size, MIN_CHUNK_SIZE
            )));
        }
        if self.chunk_size % CELL_ALIGNMENT != 0 {
            return Err(GcError::InvalidConfig(format!(
                "chunk_size {} is not cell aligned",
                self.chunk_size
            )));
        }
        if self.chunk_size > u32::MAX as usize {
            return Err(GcError::InvalidConfig(format!(
                "chunk_size {} does not fit a chunk offset",
                self.chunk_size
            )));
        }
        Ok(())
    }

    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the number of reserved chunks.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Sets the inline slot threshold.
    pub fn with_max_nursery_slots(mut self, slots: usize) -> Self {
        self.max_nursery_slots = slots;
        self
    }

    /// Sets the store buffer capacity.
    pub fn with_store_buffer_capacity(mut self, capacity: usize) -> Self {
        self.store_buffer_capacity = capacity;
        self
    }

    /// Sets the tenured heap ceiling.
    pub fn with_max_tenured_bytes(mut self, bytes: usize) -> Self {
        self.max_tenured_bytes = bytes;
        self
    }

    /// Caps the general heap.
    pub fn with_malloc_limit(mut self, bytes: usize) -> Self {
        self.malloc_limit = Some(bytes);
        self
    }

    /// Caps the tenured heap cell count.
    pub fn with_tenured_capacity(mut self, cells: usize) -> Self {
        self.tenured_capacity = Some(cells);
        self
    }

    /// Total bytes covered by all reserved chunks.
    pub fn reserved_bytes(&self) -> usize {
        self.chunk_size * self.max_chunks
    }
}
