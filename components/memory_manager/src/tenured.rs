//! Tenured heap collaborator.
//!
//! The minor collector only needs three things from the long-lived heap: a
//! way to allocate a cell of a given kind, access to the cells it produced,
//! and a way to enumerate every cell for the fallback whole-heap scan.
//! [`TenuredAllocator`] captures that seam; [`TenuredHeap`] is the default
//! arena-backed implementation.

use core_types::{CellPtr, GcError, GcResult, TenuredAddr};

use crate::object::{AllocKind, JsObject};

/// Interface to the long-lived heap used during promotion.
pub trait TenuredAllocator {
    /// Allocates an uninitialized cell of `kind`, or `None` when exhausted.
    fn allocate(&mut self, kind: AllocKind) -> Option<TenuredAddr>;

    /// Writes the object for a freshly allocated cell.
    fn initialize(&mut self, addr: TenuredAddr, object: JsObject) -> GcResult<()>;

    /// Returns the object stored at `addr`.
    fn object(&self, addr: TenuredAddr) -> GcResult<&JsObject>;

    /// Returns the object stored at `addr` mutably.
    fn object_mut(&mut self, addr: TenuredAddr) -> GcResult<&mut JsObject>;

    /// Addresses of every initialized cell, in allocation order.
    fn cells(&self) -> Vec<TenuredAddr>;

    /// Bytes occupied by allocated cells.
    fn used_bytes(&self) -> usize;
}

#[derive(Debug)]
struct TenuredCell {
    kind: AllocKind,
    object: Option<JsObject>,
}

/// Arena-backed tenured heap.
#[derive(Debug, Default)]
pub struct TenuredHeap {
    cells: Vec<TenuredCell>,
    used_bytes: usize,
    capacity: Option<usize>,
}

impl TenuredHeap {
    /// Creates an unbounded tenured heap.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a tenured heap holding at most `capacity` cells.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        TenuredHeap {
            cells: Vec::new(),
            used_bytes: 0,
            capacity,
        }
    }

    /// Number of allocated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no cell has been allocated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Kind the cell at `addr` was allocated with.
    pub fn kind(&self, addr: TenuredAddr) -> Option<AllocKind> {
        self.cells.get(addr.0 as usize).map(|cell| cell.kind)
    }

    fn dangling(addr: TenuredAddr) -> GcError {
        GcError::DanglingCell(CellPtr::Tenured(addr))
    }
}

impl TenuredAllocator for TenuredHeap {
    fn allocate(&mut self, kind: AllocKind) -> Option<TenuredAddr> {
        if let Some(capacity) = self.capacity {
            if self.cells.len() >= capacity {
                return None;
            }
        }
        let addr = TenuredAddr(u32::try_from(self.cells.len()).ok()?);
        self.cells.push(TenuredCell { kind, object: None });
        self.used_bytes += kind.thing_size();
        Some(addr)
    }

    fn initialize(&mut self, addr: TenuredAddr, object: JsObject) -> GcResult<()> {
        let cell = self
            .cells
            .get_mut(addr.0 as usize)
            .ok_or_else(|| Self::dangling(addr))?;
        cell.object = Some(object);
        Ok(())
    }

    fn object(&self, addr: TenuredAddr) -> GcResult<&JsObject> {
        self.cells
            .get(addr.0 as usize)
            .and_then(|cell| cell.object.as_ref())
            .ok_or_else(|| Self::dangling(addr))
    }

    fn object_mut(&mut self, addr: TenuredAddr) -> GcResult<&mut JsObject> {
        self.cells
            .get_mut(addr.0 as usize)
            .and_then(|cell| cell.object.as_mut())
            .ok_or_else(|| Self::dangling(addr))
    }

    fn cells(&self) -> Vec<TenuredAddr> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.object.is_some())
            .map(|(index, _)| TenuredAddr(index as u32))
            .collect()
    }

    fn used_bytes(&self) -> usize {
        self.used_bytes
    }
}
