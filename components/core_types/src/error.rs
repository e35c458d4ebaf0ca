//! Collector error types.
//!
//! Every fallible public operation of the memory manager returns
//! [`GcResult`]. Conditions the collector recovers from internally (nursery
//! exhaustion, huge-registry insertion failure) never surface here.

use thiserror::Error;

use crate::address::{CellPtr, HeapAddr, NurseryAddr};

/// Errors raised by the nursery, its allocators and the minor collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GcError {
    /// Reserving the nursery chunks failed
    #[error("failed to reserve {chunks} nursery chunks of {chunk_size} bytes")]
    ReservationFailed {
        /// Number of chunks requested
        chunks: usize,
        /// Size of each chunk in bytes
        chunk_size: usize,
    },

    /// Configuration rejected by validation or parsing
    #[error("invalid nursery configuration: {0}")]
    InvalidConfig(String),

    /// Allocation size is not a multiple of the cell alignment
    #[error("allocation size {0} is not a multiple of the cell alignment")]
    MisalignedSize(usize),

    /// The nursery is disabled and cannot serve the request
    #[error("nursery is disabled")]
    NurseryDisabled,

    /// The general heap could not satisfy a buffer allocation
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory {
        /// Size of the failed request in bytes
        bytes: usize,
    },

    /// A nursery address is outside the chunk bounds or names no cell
    #[error("no cell at {0}")]
    InvalidNurseryAddress(NurseryAddr),

    /// A pointer names no live cell
    #[error("dangling cell pointer {0}")]
    DanglingCell(CellPtr),

    /// A general-heap address names no buffer
    #[error("dangling buffer {0}")]
    DanglingBuffer(HeapAddr),

    /// A nursery cell was promoted and now only holds a forwarding record
    #[error("cell {0} has been forwarded to the tenured heap")]
    Forwarded(NurseryAddr),

    /// A nursery cell was allocated but never initialised
    #[error("cell {0} is uninitialized")]
    Uninitialized(NurseryAddr),

    /// Operation does not apply to this kind of cell or index
    #[error("type error: {0}")]
    TypeError(String),

    /// A collection is already running on this context
    #[error("a collection is already in progress")]
    CollectionInProgress,
}

/// Result type used throughout the memory manager.
pub type GcResult<T> = Result<T, GcError>;
