//! Spaces - bump-pointer regions of the arena
//!
//! Every space is a `[start, end)` range with an atomic top. Allocation is a
//! CAS on the top, so mutator threads and scavenger workers can carve memory
//! out of the same space without a lock. Workers normally take a whole LAB
//! at a time and bump privately inside it.
//!
//! The new space is a pair of semispaces. Between passes one of them
//! (to-space) holds every young object; a pass flips the pair, evacuates the
//! live objects out of what is now from-space and leaves the rest behind.

use crate::error::{NurseryError, Result};
use crate::object::Address;
use crate::util::constants::WORD_SIZE;
use crate::util::is_aligned;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Allocation target for the local allocator and mutator allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationSpace {
    NewSpace,
    OldSpace,
}

/// Space selector for heap iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceId {
    FromSpace,
    ToSpace,
    OldSpace,
}

/// Contiguous bump-pointer space
#[derive(Debug)]
pub struct Space {
    start: Address,
    end: Address,
    top: AtomicUsize,
}

impl Space {
    pub fn new(start: Address, end: Address) -> Self {
        debug_assert!(start < end);
        debug_assert!(is_aligned(start, WORD_SIZE) && is_aligned(end, WORD_SIZE));
        Self {
            start,
            end,
            top: AtomicUsize::new(start),
        }
    }

    #[inline]
    pub fn start(&self) -> Address {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Address {
        self.end
    }

    #[inline]
    pub fn top(&self) -> Address {
        self.top.load(Ordering::Acquire)
    }

    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }

    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    pub fn allocated(&self) -> usize {
        self.top() - self.start
    }

    pub fn remaining(&self) -> usize {
        self.end - self.top()
    }

    /// Allocate `size` bytes or report how much was left
    ///
    /// `size` must be a non-zero multiple of the word size.
    pub fn allocate(&self, size: usize) -> Result<Address> {
        if size == 0 || !is_aligned(size, WORD_SIZE) {
            return Err(NurseryError::InvalidArgument(format!(
                "allocation size {} is not a non-zero multiple of {}",
                size, WORD_SIZE
            )));
        }
        self.allocate_raw(size).ok_or(NurseryError::OutOfMemory {
            requested: size,
            available: self.remaining(),
        })
    }

    /// Allocate `size` bytes from the shared top
    pub fn allocate_raw(&self, size: usize) -> Option<Address> {
        debug_assert!(is_aligned(size, WORD_SIZE) && size > 0);
        let mut current = self.top.load(Ordering::Relaxed);
        loop {
            let new_top = current.checked_add(size)?;
            if new_top > self.end {
                return None;
            }
            match self.top.compare_exchange_weak(
                current,
                new_top,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(current),
                Err(actual) => current = actual,
            }
        }
    }

    /// Take up to `preferred` bytes, but at least `min`, as a private buffer
    ///
    /// Returns the `[top, limit)` range handed out.
    pub fn allocate_lab(&self, preferred: usize, min: usize) -> Option<(Address, Address)> {
        debug_assert!(min <= preferred);
        let mut current = self.top.load(Ordering::Relaxed);
        loop {
            let available = self.end.saturating_sub(current);
            if available < min {
                return None;
            }
            let new_top = current + preferred.min(available);
            match self.top.compare_exchange_weak(
                current,
                new_top,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some((current, new_top)),
                Err(actual) => current = actual,
            }
        }
    }

    /// Roll the top back to `top` if `limit` is still the space top
    pub fn try_give_back(&self, top: Address, limit: Address) -> bool {
        self.top
            .compare_exchange(limit, top, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Forget every allocation
    pub fn reset(&self) {
        self.top.store(self.start, Ordering::Release);
    }
}

/// Young generation: two semispaces and the age mark
#[derive(Debug)]
pub struct NewSpace {
    semispaces: [Space; 2],
    to_index: AtomicUsize,
    /// Objects in from-space below this address survived one pass already
    age_mark: AtomicUsize,
}

impl NewSpace {
    pub fn new(start: Address, semi_space_size: usize) -> Self {
        let middle = start + semi_space_size;
        Self {
            semispaces: [
                Space::new(start, middle),
                Space::new(middle, middle + semi_space_size),
            ],
            to_index: AtomicUsize::new(0),
            age_mark: AtomicUsize::new(start),
        }
    }

    #[inline]
    pub fn to_space(&self) -> &Space {
        &self.semispaces[self.to_index.load(Ordering::Acquire)]
    }

    #[inline]
    pub fn from_space(&self) -> &Space {
        &self.semispaces[self.to_index.load(Ordering::Acquire) ^ 1]
    }

    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        self.semispaces[0].start() <= address && address < self.semispaces[1].end()
    }

    /// Capacity of one semispace
    pub fn capacity(&self) -> usize {
        self.semispaces[0].capacity()
    }

    #[inline]
    pub fn age_mark(&self) -> Address {
        self.age_mark.load(Ordering::Acquire)
    }

    pub fn set_age_mark(&self, address: Address) {
        debug_assert!(self.to_space().contains(address) || address == self.to_space().end());
        self.age_mark.store(address, Ordering::Release);
    }

    /// Swap the semispaces and empty the new to-space
    ///
    /// Only called with the relocation lock held.
    pub fn flip(&self) {
        self.to_index.fetch_xor(1, Ordering::AcqRel);
        self.to_space().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::PAGE_SIZE;

    #[test]
    fn test_space_allocate_until_full() {
        let space = Space::new(PAGE_SIZE, 2 * PAGE_SIZE);
        let first = space.allocate(64).unwrap();
        assert_eq!(first, PAGE_SIZE);
        assert_eq!(space.allocated(), 64);

        let err = space.allocate(PAGE_SIZE).unwrap_err();
        assert!(matches!(
            err,
            NurseryError::OutOfMemory { requested, available }
                if requested == PAGE_SIZE && available == PAGE_SIZE - 64
        ));
    }

    #[test]
    fn test_space_allocate_rejects_bad_sizes() {
        let space = Space::new(PAGE_SIZE, 2 * PAGE_SIZE);
        for size in [0, 1, 12, WORD_SIZE + 1] {
            assert!(
                matches!(space.allocate(size), Err(NurseryError::InvalidArgument(_))),
                "size {} accepted",
                size
            );
        }
        assert_eq!(space.allocated(), 0);
        assert_eq!(space.allocate(WORD_SIZE).unwrap(), PAGE_SIZE);
    }

    #[test]
    fn test_allocate_lab_takes_remainder() {
        let space = Space::new(PAGE_SIZE, PAGE_SIZE + 256);
        assert_eq!(space.allocate_lab(128, 8), Some((PAGE_SIZE, PAGE_SIZE + 128)));
        // Only 128 bytes left; preferred 512 shrinks to the remainder
        assert_eq!(
            space.allocate_lab(512, 64),
            Some((PAGE_SIZE + 128, PAGE_SIZE + 256))
        );
        assert_eq!(space.allocate_lab(512, 8), None);
    }

    #[test]
    fn test_give_back_only_at_top() {
        let space = Space::new(PAGE_SIZE, 2 * PAGE_SIZE);
        let (top, limit) = space.allocate_lab(256, 8).unwrap();
        assert!(space.try_give_back(top + 64, limit));
        assert_eq!(space.top(), top + 64);

        let other = space.allocate_raw(64).unwrap();
        assert!(!space.try_give_back(top, other));
        assert_eq!(space.top(), other + 64);
    }

    #[test]
    fn test_new_space_flip() {
        let new_space = NewSpace::new(PAGE_SIZE, 4 * PAGE_SIZE);
        let a = new_space.to_space().start();
        new_space.to_space().allocate(128).unwrap();

        new_space.flip();

        assert_eq!(new_space.from_space().start(), a);
        assert_eq!(new_space.from_space().allocated(), 128);
        assert_eq!(new_space.to_space().allocated(), 0);
        assert_ne!(new_space.to_space().start(), a);
        assert!(new_space.contains(a));
        assert!(new_space.contains(new_space.to_space().start()));
    }

    #[test]
    fn test_concurrent_allocation_disjoint() {
        use std::sync::Arc;
        use std::thread;

        let space = Arc::new(Space::new(PAGE_SIZE, 9 * PAGE_SIZE));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let space = Arc::clone(&space);
                thread::spawn(move || {
                    (0..256)
                        .filter_map(|_| space.allocate_raw(32))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<Address> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4 * 256);
        assert_eq!(space.allocated(), 4 * 256 * 32);
    }
}
