//! Heap value representation.
//!
//! This module provides the `Value` enum stored in every object slot, dynamic
//! slot buffer and element buffer managed by the collector.

use std::fmt;

use crate::address::{CellPtr, NurseryAddr};

/// Represents any value a heap slot can hold.
///
/// Primitive values are stored inline, while objects are referenced through a
/// [`CellPtr`] that names either a nursery cell or a tenured cell.
///
/// # Examples
///
/// ```
/// use core_types::{CellPtr, TenuredAddr, Value};
///
/// let number = Value::Smi(42);
/// let object = Value::Object(CellPtr::Tenured(TenuredAddr(3)));
///
/// assert!(!number.is_object());
/// assert!(object.is_object());
/// assert!(!object.is_nursery_object());
/// ```
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    /// The undefined value
    #[default]
    Undefined,
    /// The null value
    Null,
    /// Boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// Reference to a GC-managed object
    Object(CellPtr),
}

impl Value {
    /// Returns true if this value references a GC-managed object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Returns the referenced cell, if any.
    pub fn as_object(&self) -> Option<CellPtr> {
        match self {
            Value::Object(ptr) => Some(*ptr),
            _ => None,
        }
    }

    /// Returns the nursery address this value points at, if it points into
    /// the nursery.
    pub fn as_nursery(&self) -> Option<NurseryAddr> {
        match self {
            Value::Object(CellPtr::Nursery(addr)) => Some(*addr),
            _ => None,
        }
    }

    /// Returns true if this value references a nursery-resident object.
    pub fn is_nursery_object(&self) -> bool {
        self.as_nursery().is_some()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Smi(n) => f.debug_tuple("Smi").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::Object(ptr) => write!(f, "Object({})", ptr),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<CellPtr> for Value {
    fn from(ptr: CellPtr) -> Self {
        Value::Object(ptr)
    }
}
