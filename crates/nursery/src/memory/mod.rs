//! Memory Operations - Word-addressed heap arena
//!
//! The heap is one contiguous arena of atomic words. An [`Address`] is a
//! byte offset into the arena and is always word aligned. Every access goes
//! through an atomic load/store, so concurrent scavenger workers can read
//! and write object payloads without `unsafe`; the forwarding-word CAS is
//! the only access that needs an ordering stronger than `Relaxed`.
//!
//! The first page of the arena is a guard page: nothing is ever allocated
//! there, so address 0 never names an object.
//!
//! # Example
//!
//! ```rust
//! use nursery::memory::Memory;
//! use std::sync::atomic::Ordering;
//!
//! let memory = Memory::new(64 * 1024);
//! memory.store(16 * 1024, 42, Ordering::Relaxed);
//! memory.copy_words(16 * 1024 + 8, 16 * 1024, 1);
//! assert_eq!(memory.load(16 * 1024 + 8, Ordering::Relaxed), 42);
//! ```

use crate::error::{NurseryError, Result};
use crate::object::Address;
use crate::util::constants::{PAGE_SIZE, WORD_SIZE, WORD_SIZE_LOG2};
use crate::util::{align_up, is_aligned};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Word-addressed backing store for all spaces
pub struct Memory {
    words: Box<[AtomicUsize]>,
}

impl Memory {
    /// Reserve an arena of `size` bytes (rounded up to a page), zeroed
    pub fn new(size: usize) -> Self {
        let size = align_up(size.max(PAGE_SIZE), PAGE_SIZE);
        let words = (0..size / WORD_SIZE)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { words }
    }

    /// Arena size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.words.len() * WORD_SIZE
    }

    /// Check if `address` is a usable, word-aligned arena address
    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        address >= PAGE_SIZE && address < self.size() && is_aligned(address, WORD_SIZE)
    }

    /// Validate an address handed in from outside the crate
    pub fn check(&self, address: Address) -> Result<()> {
        if self.contains(address) {
            Ok(())
        } else {
            Err(NurseryError::InvalidAddress { address })
        }
    }

    #[inline]
    fn cell(&self, address: Address) -> &AtomicUsize {
        debug_assert!(is_aligned(address, WORD_SIZE), "unaligned {:#x}", address);
        &self.words[address >> WORD_SIZE_LOG2]
    }

    /// Load one word
    #[inline]
    pub fn load(&self, address: Address, order: Ordering) -> usize {
        self.cell(address).load(order)
    }

    /// Store one word
    #[inline]
    pub fn store(&self, address: Address, value: usize, order: Ordering) {
        self.cell(address).store(value, order)
    }

    /// Compare-and-swap one word
    #[inline]
    pub fn compare_exchange(
        &self,
        address: Address,
        current: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> std::result::Result<usize, usize> {
        self.cell(address)
            .compare_exchange(current, new, success, failure)
    }

    /// Atomically add to one word, returning the previous value
    #[inline]
    pub fn fetch_add(&self, address: Address, delta: usize, order: Ordering) -> usize {
        self.cell(address).fetch_add(delta, order)
    }

    /// Copy `count` words from `src` to `dst`
    ///
    /// The ranges must not overlap. Each word is copied with a relaxed
    /// load/store pair; publication of the copy is the caller's job.
    pub fn copy_words(&self, dst: Address, src: Address, count: usize) {
        debug_assert!(dst + count * WORD_SIZE <= src || src + count * WORD_SIZE <= dst);
        let dst_index = dst >> WORD_SIZE_LOG2;
        let src_index = src >> WORD_SIZE_LOG2;
        let dst_words = &self.words[dst_index..dst_index + count];
        let src_words = &self.words[src_index..src_index + count];
        for (to, from) in dst_words.iter().zip(src_words) {
            to.store(from.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }

    /// Fill `count` words starting at `address` with `value`
    pub fn fill_words(&self, address: Address, count: usize, value: usize) {
        let index = address >> WORD_SIZE_LOG2;
        for word in &self.words[index..index + count] {
            word.store(value, Ordering::Relaxed);
        }
    }

    /// Snapshot `count` words starting at `address`
    pub fn read_words(&self, address: Address, count: usize) -> Vec<usize> {
        let index = address >> WORD_SIZE_LOG2;
        self.words[index..index + count]
            .iter()
            .map(|word| word.load(Ordering::Relaxed))
            .collect()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").field("size", &self.size()).finish()
    }
}
