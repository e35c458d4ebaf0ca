//! Addresses of GC-managed memory.
//!
//! The nursery is an arena of fixed-size chunks, so a nursery address is a
//! `(chunk, offset)` pair validated against the chunk bounds rather than a raw
//! pointer. Tenured cells are named by their index in the tenured arena and
//! general-heap buffers by a synthetic, stable address.

use std::fmt;

/// Minimum alignment (and size granularity) of every nursery allocation.
pub const CELL_ALIGNMENT: usize = 8;

/// Width in bytes of one slot (fixed slot, dynamic slot or element).
pub const SLOT_SIZE: usize = 8;

/// Size in bytes of an object header (class, shape, slots and elements words).
pub const CELL_HEADER_SIZE: usize = 16;

/// Rounds `size` up to the next multiple of [`CELL_ALIGNMENT`].
pub fn align_up(size: usize) -> usize {
    (size + CELL_ALIGNMENT - 1) & !(CELL_ALIGNMENT - 1)
}

/// Location of a cell or buffer inside the nursery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NurseryAddr {
    /// Index of the chunk
    pub chunk: u32,
    /// Byte offset from the start of the chunk
    pub offset: u32,
}

impl NurseryAddr {
    /// Creates a nursery address.
    pub fn new(chunk: u32, offset: u32) -> Self {
        NurseryAddr { chunk, offset }
    }
}

impl fmt::Display for NurseryAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nursery[{}:{:#x}]", self.chunk, self.offset)
    }
}

/// Index of a cell in the tenured heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenuredAddr(pub u32);

impl fmt::Display for TenuredAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenured#{}", self.0)
    }
}

/// Address of a buffer allocated from the general (malloc) heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapAddr(pub u64);

impl fmt::Display for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heap@{:#x}", self.0)
    }
}

/// Pointer to a GC-managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellPtr {
    /// Object allocated in the nursery
    Nursery(NurseryAddr),
    /// Object living in the tenured heap
    Tenured(TenuredAddr),
}

impl CellPtr {
    /// Returns true if the cell is nursery-resident.
    pub fn is_nursery(&self) -> bool {
        matches!(self, CellPtr::Nursery(_))
    }

    /// Returns the tenured address, if this is a tenured cell.
    pub fn as_tenured(&self) -> Option<TenuredAddr> {
        match self {
            CellPtr::Tenured(addr) => Some(*addr),
            CellPtr::Nursery(_) => None,
        }
    }
}

impl fmt::Display for CellPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellPtr::Nursery(addr) => addr.fmt(f),
            CellPtr::Tenured(addr) => addr.fmt(f),
        }
    }
}

/// Pointer to an object's payload storage (dynamic slots or elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferPtr {
    /// No payload allocated
    #[default]
    Empty,
    /// Payload bump-allocated inline in the nursery
    Nursery(NurseryAddr),
    /// Payload allocated from the general heap
    Heap(HeapAddr),
    /// Payload embedded in the fixed slots of the given (owning) cell
    Fixed(CellPtr),
}

impl BufferPtr {
    /// Returns true if the payload lives in the nursery.
    pub fn is_nursery(&self) -> bool {
        matches!(self, BufferPtr::Nursery(_))
    }

    /// Returns the general-heap address, if the payload lives there.
    pub fn as_heap(&self) -> Option<HeapAddr> {
        match self {
            BufferPtr::Heap(addr) => Some(*addr),
            _ => None,
        }
    }
}

/// Location of a single pointer-sized value slot somewhere in the heap.
///
/// This is the "pointer location" handed to tracing visitors and recorded by
/// the store buffer; the value itself is read and written through the
/// owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSlot {
    /// Fixed slot `index` of a cell (also used for inline elements)
    Fixed {
        /// Owning cell
        cell: CellPtr,
        /// Slot index
        index: u32,
    },
    /// Entry `index` of an out-of-line buffer
    Buffer {
        /// Buffer holding the value
        buffer: BufferPtr,
        /// Entry index
        index: u32,
    },
}

impl ValueSlot {
    /// Returns true if the slot location itself is inside the nursery.
    pub fn is_in_nursery(&self) -> bool {
        match self {
            ValueSlot::Fixed { cell, .. } => cell.is_nursery(),
            ValueSlot::Buffer { buffer, .. } => match buffer {
                BufferPtr::Fixed(cell) => cell.is_nursery(),
                other => other.is_nursery(),
            },
        }
    }
}
