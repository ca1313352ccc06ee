//! Atomic Bitmap - one bit per heap word or per page
//!
//! Backs the remembered-set slot sets, the marking colours and the
//! evacuation-candidate page set. Bits are set and cleared with
//! `fetch_or`/`fetch_and`, so any number of threads can update the same
//! bitmap; readers get a per-cell snapshot.
//!
//! ```text
//! Slot set for one 16KB page:
//! Granularity: 1 bit per 8-byte word
//! Bits: 16384 / 8 = 2048  ->  32 cells of 64 bits
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

const BITS_PER_CELL: usize = 64;

/// Fixed-size concurrent bit set
pub struct Bitmap {
    cells: Box<[AtomicU64]>,
    bit_count: usize,
}

impl Bitmap {
    /// Create a cleared bitmap of `bit_count` bits
    pub fn new(bit_count: usize) -> Self {
        let cells = (0..bit_count.div_ceil(BITS_PER_CELL))
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { cells, bit_count }
    }

    #[inline]
    fn indices(&self, bit: usize) -> (usize, u64) {
        debug_assert!(bit < self.bit_count, "bit {} >= {}", bit, self.bit_count);
        (bit / BITS_PER_CELL, 1u64 << (bit % BITS_PER_CELL))
    }

    /// Set `bit`, returning true if it was previously clear
    #[inline]
    pub fn set(&self, bit: usize) -> bool {
        let (cell, mask) = self.indices(bit);
        self.cells[cell].fetch_or(mask, Ordering::Relaxed) & mask == 0
    }

    /// Clear `bit`, returning true if it was previously set
    #[inline]
    pub fn clear(&self, bit: usize) -> bool {
        let (cell, mask) = self.indices(bit);
        self.cells[cell].fetch_and(!mask, Ordering::Relaxed) & mask != 0
    }

    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        let (cell, mask) = self.indices(bit);
        self.cells[cell].load(Ordering::Relaxed) & mask != 0
    }

    /// Clear all bits
    pub fn clear_all(&self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.load(Ordering::Relaxed) == 0)
    }

    pub fn len(&self) -> usize {
        self.bit_count
    }

    /// Indices of the set bits, each cell read once
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().enumerate().flat_map(|(index, cell)| {
            let mut bits = cell.load(Ordering::Relaxed);
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let offset = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(index * BITS_PER_CELL + offset)
            })
        })
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("bits", &self.bit_count)
            .field("set", &self.count())
            .finish()
    }
}
