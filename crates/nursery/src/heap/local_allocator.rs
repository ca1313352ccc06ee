//! LocalAllocator - per-worker evacuation allocation
//!
//! Each scavenger task owns one allocator with two private buffers (LABs),
//! one in to-space and one in old space. Allocation inside a LAB is a plain
//! bump with no atomics; only refills touch the shared space tops.
//!
//! ## Refill
//!
//! A refill takes `lab_size` bytes from the shared cursor, or whatever is
//! left of the space when that still fits the request. A chunk that starts
//! exactly at the retired LAB's limit is merged with it; otherwise the old
//! remainder becomes a filler so the space stays iterable. Requests above
//! `max_lab_object_size` bypass the LAB.
//!
//! Once a refill fails the space is treated as exhausted for this worker.

use super::spaces::{AllocationSpace, Space};
use super::Heap;
use crate::object::{Address, HeapObject};

/// Private `[top, limit)` bump region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalAllocationBuffer {
    top: Address,
    limit: Address,
}

impl LocalAllocationBuffer {
    pub fn new(top: Address, limit: Address) -> Self {
        debug_assert!(top <= limit);
        Self { top, limit }
    }

    pub fn top(&self) -> Address {
        self.top
    }

    pub fn limit(&self) -> Address {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.top
    }

    #[inline]
    fn try_allocate(&mut self, size: usize) -> Option<Address> {
        if self.remaining() < size {
            return None;
        }
        let address = self.top;
        self.top += size;
        Some(address)
    }

    /// Undo the most recent allocation
    fn try_free_last(&mut self, address: Address, size: usize) -> bool {
        if self.top != 0 && address + size == self.top {
            self.top = address;
            true
        } else {
            false
        }
    }

    /// Extend by a chunk that starts at the current limit
    fn try_merge(&mut self, top: Address, limit: Address) -> bool {
        if self.limit != 0 && self.limit == top {
            self.limit = limit;
            true
        } else {
            false
        }
    }
}

/// Allocation state of one scavenger task
pub struct LocalAllocator<'h> {
    heap: &'h Heap,
    new_lab: LocalAllocationBuffer,
    old_lab: LocalAllocationBuffer,
    new_lab_failed: bool,
    old_lab_failed: bool,
}

impl<'h> LocalAllocator<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            new_lab: LocalAllocationBuffer::default(),
            old_lab: LocalAllocationBuffer::default(),
            new_lab_failed: false,
            old_lab_failed: false,
        }
    }

    /// Allocate `size` bytes in `space` for an evacuated object
    pub fn allocate(&mut self, space: AllocationSpace, size: usize) -> Option<Address> {
        let heap = self.heap;
        let target = heap.space(space);
        if size > heap.config().max_lab_object_size {
            return target.allocate_raw(size);
        }

        let (lab, failed) = self.lab_mut(space);
        if let Some(address) = lab.try_allocate(size) {
            return Some(address);
        }
        if !Self::refill(heap, target, lab, failed, size) {
            return None;
        }
        lab.try_allocate(size)
    }

    fn lab_mut(&mut self, space: AllocationSpace) -> (&mut LocalAllocationBuffer, &mut bool) {
        match space {
            AllocationSpace::NewSpace => (&mut self.new_lab, &mut self.new_lab_failed),
            AllocationSpace::OldSpace => (&mut self.old_lab, &mut self.old_lab_failed),
        }
    }

    fn refill(
        heap: &Heap,
        target: &Space,
        lab: &mut LocalAllocationBuffer,
        failed: &mut bool,
        size: usize,
    ) -> bool {
        if *failed {
            return false;
        }
        let Some((top, limit)) = target.allocate_lab(heap.config().lab_size, size) else {
            *failed = true;
            return false;
        };
        if !lab.try_merge(top, limit) {
            heap.create_filler_object_at(lab.top, lab.remaining());
            *lab = LocalAllocationBuffer::new(top, limit);
        }
        true
    }

    /// Give back the last allocation after losing a forwarding race
    pub fn free_last(&mut self, space: AllocationSpace, object: HeapObject, size: usize) {
        let heap = self.heap;
        let (lab, _) = self.lab_mut(space);
        if !lab.try_free_last(object.address(), size) {
            heap.create_filler_object_at(object.address(), size);
        }
    }

    /// Close both LABs
    pub fn finalize(&mut self) {
        let heap = self.heap;
        Self::close(heap, heap.space(AllocationSpace::NewSpace), &mut self.new_lab);
        Self::close(heap, heap.space(AllocationSpace::OldSpace), &mut self.old_lab);
    }

    fn close(heap: &Heap, target: &Space, lab: &mut LocalAllocationBuffer) {
        let remaining = lab.remaining();
        if remaining > 0 && !target.try_give_back(lab.top, lab.limit) {
            heap.create_filler_object_at(lab.top, remaining);
        }
        *lab = LocalAllocationBuffer::default();
    }

    pub fn new_lab(&self) -> LocalAllocationBuffer {
        self.new_lab
    }

    pub fn old_lab(&self) -> LocalAllocationBuffer {
        self.old_lab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScavengerConfig;
    use crate::heap::SpaceId;
    use crate::util::constants::{KB, WORD_SIZE};

    fn heap() -> Heap {
        Heap::new(ScavengerConfig {
            semi_space_size: 64 * KB,
            old_space_size: 64 * KB,
            max_handles: 16,
            lab_size: KB,
            max_lab_object_size: 512,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_lab_bump_and_give_back() {
        let heap = heap();
        let to_space = heap.new_space().to_space();
        let mut allocator = LocalAllocator::new(&heap);

        let a = allocator.allocate(AllocationSpace::NewSpace, 32).unwrap();
        let b = allocator.allocate(AllocationSpace::NewSpace, 32).unwrap();
        assert_eq!(a, to_space.start());
        assert_eq!(b, a + 32);
        // Whole LAB reserved from the shared cursor
        assert_eq!(to_space.allocated(), KB);

        allocator.finalize();
        assert_eq!(to_space.allocated(), 64);
        assert_eq!(allocator.new_lab(), LocalAllocationBuffer::default());
    }

    #[test]
    fn test_adjacent_refill_merges() {
        let heap = heap();
        let mut allocator = LocalAllocator::new(&heap);

        let first = allocator.allocate(AllocationSpace::NewSpace, 1000).unwrap();
        // Above max_lab_object_size: shared cursor, not the LAB
        assert_eq!(first, heap.new_space().to_space().start());
        assert_eq!(allocator.new_lab(), LocalAllocationBuffer::default());

        allocator.allocate(AllocationSpace::NewSpace, 512).unwrap();
        allocator.allocate(AllocationSpace::NewSpace, 504).unwrap();
        let lab = allocator.new_lab();
        assert_eq!(lab.remaining(), 8);

        // 8 bytes left, 16 needed: the next chunk starts at the limit
        let c = allocator.allocate(AllocationSpace::NewSpace, 16).unwrap();
        assert_eq!(c, lab.top());
        assert_eq!(allocator.new_lab().limit(), lab.limit() + KB);
    }

    #[test]
    fn test_non_adjacent_refill_fills_remainder() {
        let heap = heap();
        let mut allocator = LocalAllocator::new(&heap);

        allocator.allocate(AllocationSpace::NewSpace, 512).unwrap();
        allocator.allocate(AllocationSpace::NewSpace, 504).unwrap();
        let stale = allocator.new_lab();
        // Someone else takes the memory right behind the LAB
        heap.allocate_young(64).unwrap();

        allocator.allocate(AllocationSpace::NewSpace, 16).unwrap();
        assert_ne!(allocator.new_lab().top(), stale.top());
        let filler = HeapObject::from_address(stale.top());
        assert_eq!(heap.size_of(filler), WORD_SIZE);
    }

    #[test]
    fn test_free_last_rolls_back() {
        let heap = heap();
        let mut allocator = LocalAllocator::new(&heap);

        let a = allocator.allocate(AllocationSpace::OldSpace, 24).unwrap();
        allocator.free_last(AllocationSpace::OldSpace, HeapObject::from_address(a), 24);
        let b = allocator.allocate(AllocationSpace::OldSpace, 24).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_free_last_not_last_fills() {
        let heap = heap();
        let mut allocator = LocalAllocator::new(&heap);

        let a = allocator.allocate(AllocationSpace::NewSpace, 24).unwrap();
        allocator.allocate(AllocationSpace::NewSpace, 16).unwrap();
        allocator.free_last(AllocationSpace::NewSpace, HeapObject::from_address(a), 24);
        assert_eq!(heap.size_of(HeapObject::from_address(a)), 24);
    }

    #[test]
    fn test_exhaustion_fails_fast() {
        let heap = heap();
        let mut allocator = LocalAllocator::new(&heap);
        let mut count = 0;
        while allocator.allocate(AllocationSpace::NewSpace, 256).is_some() {
            count += 1;
        }
        assert_eq!(count, 64 * KB / 256);
        assert!(allocator.allocate(AllocationSpace::NewSpace, 8).is_none());
    }

    #[test]
    fn test_finalize_keeps_space_iterable() {
        let heap = heap();
        let mut first = LocalAllocator::new(&heap);
        let mut second = LocalAllocator::new(&heap);

        let a = first.allocate(AllocationSpace::NewSpace, 16).unwrap();
        let b = second.allocate(AllocationSpace::NewSpace, 16).unwrap();
        for address in [a, b] {
            heap.create_filler_object_at(address, 16);
        }
        // `first` is no longer at the top and must fill its remainder
        first.finalize();
        second.finalize();

        assert_eq!(heap.new_space().to_space().allocated(), KB + 16);
        assert!(heap.objects_in(SpaceId::ToSpace).unwrap().is_empty());
    }
}
