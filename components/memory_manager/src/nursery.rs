//! Nursery space manager.
//!
//! The nursery reserves `max_chunks` fixed-size chunks up front and
//! bump-allocates from a prefix of `active_chunks` of them. Memory is an arena
//! of slabs: each chunk records the cells carved out of it keyed by byte
//! offset, and every access goes through a [`NurseryAddr`] validated against
//! the chunk bounds.
//!
//! A cell is tagged: it holds a live object, an inline payload buffer, or,
//! once its object has been promoted, a forwarding record.

use core_types::{GcError, GcResult, NurseryAddr, TenuredAddr, Value, CELL_ALIGNMENT};

use crate::config::NurseryConfig;
use crate::object::JsObject;

/// Forwarding record left behind when a nursery object is promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationOverlay {
    /// Address of the tenured copy
    pub new_location: TenuredAddr,
}

/// Contents of one nursery allocation.
#[derive(Debug, Clone)]
pub enum NurseryCell {
    /// Allocated but not yet written
    Uninitialized,
    /// Live object
    Object(JsObject),
    /// Inline dynamic slots or elements of a nursery object
    Buffer(Vec<Value>),
    /// Object promoted to the tenured heap
    Forwarded(RelocationOverlay),
}

/// A fixed-size slab of nursery memory.
#[derive(Debug)]
struct Chunk {
    /// Cells in allocation (and therefore offset) order
    cells: Vec<(u32, NurseryCell)>,
    /// Bytes handed out from this chunk
    used: usize,
}

impl Chunk {
    fn new() -> Self {
        Chunk {
            cells: Vec::new(),
            used: 0,
        }
    }

    fn find(&self, offset: u32) -> Option<usize> {
        self.cells
            .binary_search_by_key(&offset, |(start, _)| *start)
            .ok()
    }

    fn reset(&mut self) {
        self.cells.clear();
        self.used = 0;
    }
}

/// Young-object space with bump-pointer allocation.
#[derive(Debug)]
pub struct Nursery {
    /// Size of each chunk in bytes
    chunk_size: usize,
    /// All reserved chunks
    chunks: Vec<Chunk>,
    /// Number of chunks allocation may use
    active_chunks: usize,
    /// Chunk currently being bump-allocated
    current_chunk: usize,
    /// Bump pointer, as an offset into the current chunk
    position: usize,
    /// Whether the nursery participates in allocation
    enabled: bool,
}

impl Nursery {
    /// Reserves the nursery chunks described by `config`.
    ///
    /// The nursery starts enabled with one active chunk.
    pub fn init(config: &NurseryConfig) -> GcResult<Self> {
        config.validate()?;

        let mut chunks = Vec::new();
        chunks
            .try_reserve_exact(config.max_chunks)
            .map_err(|_| GcError::ReservationFailed {
                chunks: config.max_chunks,
                chunk_size: config.chunk_size,
            })?;
        chunks.extend((0..config.max_chunks).map(|_| Chunk::new()));

        log::debug!(
            "reserved nursery: {} chunks of {} bytes",
            config.max_chunks,
            config.chunk_size
        );

        Ok(Nursery {
            chunk_size: config.chunk_size,
            chunks,
            active_chunks: 1,
            current_chunk: 0,
            position: 0,
            enabled: true,
        })
    }

    /// Allocates `size` bytes using bump-pointer allocation.
    ///
    /// `size` must be a multiple of the cell alignment. When the current
    /// chunk cannot hold the request allocation moves on to the next active
    /// chunk; once the last active chunk is exhausted this returns `None` and
    /// the caller must fall back to the tenured heap.
    pub fn allocate(&mut self, size: usize) -> Option<NurseryAddr> {
        debug_assert!(size % CELL_ALIGNMENT == 0, "misaligned nursery request");

        if !self.enabled || size > self.chunk_size {
            return None;
        }

        while self.position + size > self.chunk_size {
            if self.current_chunk + 1 >= self.active_chunks {
                return None;
            }
            self.set_current_chunk(self.current_chunk + 1);
        }

        let addr = NurseryAddr::new(self.current_chunk as u32, self.position as u32);
        self.position += size;

        let chunk = &mut self.chunks[self.current_chunk];
        chunk.used = self.position;
        chunk.cells.push((addr.offset, NurseryCell::Uninitialized));
        Some(addr)
    }

    /// Checked form of [`Nursery::allocate`] for payload allocation.
    ///
    /// # Returns
    /// `Ok(None)` when the active chunks are exhausted
    ///
    /// # Errors
    /// `MisalignedSize` if `size` is not cell aligned, `NurseryDisabled` if
    /// the nursery is off
    pub fn try_allocate(&mut self, size: usize) -> GcResult<Option<NurseryAddr>> {
        if size % CELL_ALIGNMENT != 0 {
            return Err(GcError::MisalignedSize(size));
        }
        if !self.enabled {
            return Err(GcError::NurseryDisabled);
        }
        Ok(self.allocate(size))
    }

    fn set_current_chunk(&mut self, index: usize) {
        debug_assert!(index < self.chunks.len());
        self.current_chunk = index;
        self.position = 0;
    }

    /// Returns true if `addr` lies inside the reserved nursery region.
    pub fn is_inside(&self, addr: NurseryAddr) -> bool {
        (addr.chunk as usize) < self.chunks.len() && (addr.offset as usize) < self.chunk_size
    }

    fn slot_index(&self, addr: NurseryAddr) -> GcResult<(usize, usize)> {
        if !self.is_inside(addr) {
            return Err(GcError::InvalidNurseryAddress(addr));
        }
        let chunk = addr.chunk as usize;
        let index = self.chunks[chunk]
            .find(addr.offset)
            .ok_or(GcError::InvalidNurseryAddress(addr))?;
        Ok((chunk, index))
    }

    /// Returns the cell at `addr`.
    pub fn cell(&self, addr: NurseryAddr) -> GcResult<&NurseryCell> {
        let (chunk, index) = self.slot_index(addr)?;
        Ok(&self.chunks[chunk].cells[index].1)
    }

    /// Returns the cell at `addr` mutably.
    pub fn cell_mut(&mut self, addr: NurseryAddr) -> GcResult<&mut NurseryCell> {
        let (chunk, index) = self.slot_index(addr)?;
        Ok(&mut self.chunks[chunk].cells[index].1)
    }

    /// Overwrites the cell at `addr`, returning the previous contents.
    pub fn replace_cell(&mut self, addr: NurseryAddr, cell: NurseryCell) -> GcResult<NurseryCell> {
        Ok(std::mem::replace(self.cell_mut(addr)?, cell))
    }

    /// Returns the live object at `addr`.
    pub fn object(&self, addr: NurseryAddr) -> GcResult<&JsObject> {
        match self.cell(addr)? {
            NurseryCell::Object(obj) => Ok(obj),
            other => Err(Self::not_an_object(addr, other)),
        }
    }

    /// Returns the live object at `addr` mutably.
    pub fn object_mut(&mut self, addr: NurseryAddr) -> GcResult<&mut JsObject> {
        match self.cell_mut(addr)? {
            NurseryCell::Object(obj) => Ok(obj),
            other => Err(Self::not_an_object(addr, other)),
        }
    }

    fn not_an_object(addr: NurseryAddr, cell: &NurseryCell) -> GcError {
        match cell {
            NurseryCell::Forwarded(_) => GcError::Forwarded(addr),
            NurseryCell::Uninitialized => GcError::Uninitialized(addr),
            _ => GcError::TypeError(format!("{} is a payload buffer, not an object", addr)),
        }
    }

    /// Returns the inline buffer at `addr`.
    pub fn buffer(&self, addr: NurseryAddr) -> GcResult<&Vec<Value>> {
        match self.cell(addr)? {
            NurseryCell::Buffer(values) => Ok(values),
            _ => Err(GcError::TypeError(format!("{} is not a payload buffer", addr))),
        }
    }

    /// Returns the inline buffer at `addr` mutably.
    pub fn buffer_mut(&mut self, addr: NurseryAddr) -> GcResult<&mut Vec<Value>> {
        match self.cell_mut(addr)? {
            NurseryCell::Buffer(values) => Ok(values),
            _ => Err(GcError::TypeError(format!("{} is not a payload buffer", addr))),
        }
    }

    /// Returns the tenured address of a promoted cell.
    pub fn forwarded(&self, addr: NurseryAddr) -> Option<TenuredAddr> {
        match self.cell(addr) {
            Ok(NurseryCell::Forwarded(overlay)) => Some(overlay.new_location),
            _ => None,
        }
    }

    /// Returns true if nothing has been allocated since the last sweep.
    pub fn is_empty(&self) -> bool {
        self.current_chunk == 0 && self.position == 0
    }

    /// Bytes allocated since the last sweep.
    pub fn used_bytes(&self) -> usize {
        self.chunks
            .iter()
            .take(self.current_chunk + 1)
            .map(|chunk| chunk.used)
            .sum()
    }

    /// Bytes available to allocation across all active chunks.
    pub fn capacity(&self) -> usize {
        self.active_chunks * self.chunk_size
    }

    /// Returns true if the nursery participates in allocation.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-enables a disabled nursery with a single active chunk.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.active_chunks = 1;
        self.set_current_chunk(0);
    }

    /// Disables the nursery; subsequent allocations fail.
    ///
    /// The nursery must be empty, which is the case right after a sweep.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        debug_assert!(self.is_empty(), "disabling a non-empty nursery");
        self.enabled = false;
        self.active_chunks = 0;
        self.set_current_chunk(0);
    }

    /// Doubles the number of active chunks, capped at the reserved count.
    pub fn grow_allocable_space(&mut self) {
        self.active_chunks = (self.active_chunks * 2).clamp(1, self.chunks.len());
    }

    /// Gives back one active chunk, keeping at least one.
    pub fn shrink_allocable_space(&mut self) {
        self.active_chunks = self.active_chunks.saturating_sub(1).max(1);
    }

    /// Reclaims every cell and resets the bump pointer to chunk 0.
    pub fn sweep(&mut self) {
        for chunk in self.chunks.iter_mut().take(self.current_chunk + 1) {
            chunk.reset();
        }
        self.set_current_chunk(0);
    }

    /// Number of reserved chunks.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of chunks allocation may currently use.
    pub fn active_chunks(&self) -> usize {
        self.active_chunks
    }

    /// Index of the chunk being allocated from.
    pub fn current_chunk(&self) -> usize {
        self.current_chunk
    }

    /// Bump pointer offset within the current chunk.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Size of one chunk in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of cells allocated since the last sweep.
    pub fn cell_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.cells.len()).sum()
    }
}
