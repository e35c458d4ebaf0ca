//! General-heap buffers.
//!
//! Dynamic slots and elements that do not live in the nursery are allocated
//! here, the way a runtime would `malloc` them. Each buffer gets a stable,
//! synthetic address that only changes when a reallocation has to grow past
//! the buffer's capacity.

use std::collections::HashMap;

use core_types::{GcError, GcResult, HeapAddr, Value, SLOT_SIZE};

/// First address handed out by the general heap.
const HEAP_BASE: u64 = 0x1000_0000;

/// Spacing between consecutive buffer addresses.
const HEAP_ALIGN: u64 = 16;

#[derive(Debug)]
struct HeapBuffer {
    values: Vec<Value>,
    capacity: usize,
}

/// Allocator for out-of-line payload buffers.
#[derive(Debug)]
pub struct MallocHeap {
    buffers: HashMap<HeapAddr, HeapBuffer>,
    next_addr: u64,
    allocated_bytes: usize,
    limit: Option<usize>,
}

impl MallocHeap {
    /// Creates an unbounded general heap.
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Creates a general heap that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        MallocHeap {
            buffers: HashMap::new(),
            next_addr: HEAP_BASE,
            allocated_bytes: 0,
            limit,
        }
    }

    fn reserve(&mut self, capacity: usize) -> GcResult<HeapAddr> {
        let bytes = capacity * SLOT_SIZE;
        if let Some(limit) = self.limit {
            if self.allocated_bytes + bytes > limit {
                return Err(GcError::OutOfMemory { bytes });
            }
        }
        let addr = HeapAddr(self.next_addr);
        let stride = (bytes as u64).max(HEAP_ALIGN).next_multiple_of(HEAP_ALIGN);
        self.next_addr += stride;
        self.allocated_bytes += bytes;
        Ok(addr)
    }

    /// Allocates a buffer of `count` undefined values.
    pub fn allocate(&mut self, count: usize) -> GcResult<HeapAddr> {
        self.allocate_from(vec![Value::Undefined; count])
    }

    /// Allocates a buffer holding `values`.
    pub fn allocate_from(&mut self, values: Vec<Value>) -> GcResult<HeapAddr> {
        let capacity = values.len();
        let addr = self.reserve(capacity)?;
        self.buffers.insert(addr, HeapBuffer { values, capacity });
        Ok(addr)
    }

    /// Resizes the buffer at `addr` to `new_count` values.
    ///
    /// The buffer keeps its address while `new_count` fits its capacity;
    /// otherwise the contents move to a fresh address and the old one is
    /// released. On failure the original buffer is left untouched.
    pub fn reallocate(&mut self, addr: HeapAddr, new_count: usize) -> GcResult<HeapAddr> {
        let capacity = self
            .buffers
            .get(&addr)
            .ok_or(GcError::DanglingBuffer(addr))?
            .capacity;

        if new_count <= capacity {
            let buffer = self
                .buffers
                .get_mut(&addr)
                .ok_or(GcError::DanglingBuffer(addr))?;
            buffer.values.resize(new_count, Value::Undefined);
            return Ok(addr);
        }

        let new_addr = self.reserve(new_count)?;
        let mut old = self
            .buffers
            .remove(&addr)
            .ok_or(GcError::DanglingBuffer(addr))?;
        self.allocated_bytes -= old.capacity * SLOT_SIZE;
        old.values.resize(new_count, Value::Undefined);
        self.buffers.insert(
            new_addr,
            HeapBuffer {
                values: old.values,
                capacity: new_count,
            },
        );
        Ok(new_addr)
    }

    /// Releases the buffer at `addr`. Returns false if no such buffer exists.
    pub fn free(&mut self, addr: HeapAddr) -> bool {
        match self.buffers.remove(&addr) {
            Some(buffer) => {
                self.allocated_bytes -= buffer.capacity * SLOT_SIZE;
                true
            }
            None => false,
        }
    }

    /// Returns the contents of the buffer at `addr`.
    pub fn get(&self, addr: HeapAddr) -> GcResult<&Vec<Value>> {
        self.buffers
            .get(&addr)
            .map(|buffer| &buffer.values)
            .ok_or(GcError::DanglingBuffer(addr))
    }

    /// Returns the contents of the buffer at `addr` mutably.
    pub fn get_mut(&mut self, addr: HeapAddr) -> GcResult<&mut Vec<Value>> {
        self.buffers
            .get_mut(&addr)
            .map(|buffer| &mut buffer.values)
            .ok_or(GcError::DanglingBuffer(addr))
    }

    /// Returns true if `addr` names a live buffer.
    pub fn contains(&self, addr: HeapAddr) -> bool {
        self.buffers.contains_key(&addr)
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no buffers are live.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }
}

impl Default for MallocHeap {
    fn default() -> Self {
        Self::new()
    }
}
