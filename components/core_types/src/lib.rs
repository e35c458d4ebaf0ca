//! Core value, address and error types for the nursery collector.
//!
//! This crate provides the vocabulary shared by the memory manager and its
//! tests.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of slot values
//! - [`CellPtr`], [`BufferPtr`], [`ValueSlot`] - Addresses of cells, payload
//!   buffers and individual slots
//! - [`GcError`] - Errors raised by the collector
//!
//! # Examples
//!
//! ```
//! use core_types::{CellPtr, NurseryAddr, Value};
//!
//! let young = Value::Object(CellPtr::Nursery(NurseryAddr::new(0, 0)));
//! assert!(young.is_nursery_object());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod address;
mod error;
mod value;

pub use address::{
    align_up, BufferPtr, CellPtr, HeapAddr, NurseryAddr, TenuredAddr, ValueSlot, CELL_ALIGNMENT,
    CELL_HEADER_SIZE, SLOT_SIZE,
};
pub use error::{GcError, GcResult};
pub use value::Value;
