//! Mark bitmap for the store-buffer-overflow fallback.
//!
//! One bit per cell-aligned nursery offset. The bitmap is only populated when
//! the store buffer overflowed and the collector has to discover tenured to
//! nursery edges by scanning the whole tenured heap.

use core_types::{NurseryAddr, CELL_ALIGNMENT};

/// Bit-per-cell map over the reserved nursery region.
#[derive(Debug)]
pub struct FallbackBitmap {
    words: Vec<u64>,
    cells_per_chunk: usize,
}

impl FallbackBitmap {
    /// Creates a cleared bitmap covering `num_chunks` chunks of `chunk_size`.
    pub fn new(num_chunks: usize, chunk_size: usize) -> Self {
        let cells_per_chunk = chunk_size / CELL_ALIGNMENT;
        let bits = num_chunks * cells_per_chunk;
        FallbackBitmap {
            words: vec![0; bits.div_ceil(64)],
            cells_per_chunk,
        }
    }

    /// Bit for `addr`, or `None` if it lies outside the reserved region.
    fn bit_index(&self, addr: NurseryAddr) -> Option<usize> {
        let offset = addr.offset as usize / CELL_ALIGNMENT;
        if offset >= self.cells_per_chunk {
            return None;
        }
        let bit = addr.chunk as usize * self.cells_per_chunk + offset;
        (bit / 64 < self.words.len()).then_some(bit)
    }

    /// Marks `addr`. Returns true if it was not already marked; addresses
    /// outside the reserved region are never marked.
    pub fn set(&mut self, addr: NurseryAddr) -> bool {
        let Some(bit) = self.bit_index(addr) else {
            return false;
        };
        let word = &mut self.words[bit / 64];
        let mask = 1u64 << (bit % 64);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    /// Returns true if `addr` is marked.
    pub fn is_set(&self, addr: NurseryAddr) -> bool {
        self.bit_index(addr)
            .is_some_and(|bit| self.words[bit / 64] & (1u64 << (bit % 64)) != 0)
    }

    /// Returns every marked address in ascending order.
    pub fn marked(&self) -> Vec<NurseryAddr> {
        let mut marked = Vec::new();
        for (word_index, &word) in self.words.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let bit = word_index * 64 + bits.trailing_zeros() as usize;
                let chunk = bit / self.cells_per_chunk;
                let offset = (bit % self.cells_per_chunk) * CELL_ALIGNMENT;
                marked.push(NurseryAddr::new(chunk as u32, offset as u32));
                bits &= bits - 1;
            }
        }
        marked
    }

    /// Number of marked addresses.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}
