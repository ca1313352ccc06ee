//! Evacuation: copying, promotion and forwarding
//!
//! ## Publishing a copy
//!
//! 1. allocate the target (LAB bump)
//! 2. write the map word and copy the body, relaxed
//! 3. CAS the source map word from the map to the forwarding address,
//!    release on success
//!
//! A reader that acquire-loads a forwarding address therefore sees the whole
//! copy. A task that loses step 3 frees its target and uses the winner's.
//!
//! ## Collapsing string indirections
//!
//! Thin strings and cons strings with an empty right side are not copied
//! when no incremental marking is running. The slot is pointed at the
//! underlying string instead (evacuating it first when it is young) and the
//! wrapper is forwarded there, so every later visitor collapses the same way.
//! Chains of wrappers are followed to the first plain string and every
//! wrapper on the chain is forwarded to it.

use super::Scavenger;
use crate::error::fatal_process_out_of_memory;
use crate::heap::{AllocationSpace, SlotCallbackResult};
use crate::object::layout::{
    CONS_STRING_FIRST_OFFSET, CONS_STRING_SECOND_OFFSET, HEADER_SIZE, THIN_STRING_ACTUAL_OFFSET,
};
use crate::object::{size_from_map, HeapObject, Map, MapWord, Slot, Value, VisitorId};
use crate::util::constants::WORD_SIZE;
use std::sync::atomic::Ordering;

impl<'a> Scavenger<'a> {
    /// Evacuate the from-space `object` referenced by `slot` and update the
    /// slot to its new location
    ///
    /// Returns whether the slot still points into the new space.
    pub fn scavenge_object(&mut self, slot: Slot, object: HeapObject) -> SlotCallbackResult {
        debug_assert!(self.heap.in_from_space(object));

        let first_word = self.heap.synchronized_map_word(object);
        let target = if first_word.is_forwarding_address() {
            let target = first_word.to_forwarding_address();
            self.heap.store_slot(slot, Value::from(target));
            target
        } else {
            let map = self.heap.maps().get(first_word.to_map());
            let size = size_from_map(self.heap.memory(), &map, object);
            self.evacuate_object(slot, first_word, map, object, size)
        };

        if self.heap.in_new_space(target) {
            debug_assert!(self.heap.in_to_space(target));
            SlotCallbackResult::Keep
        } else {
            SlotCallbackResult::Remove
        }
    }

    /// Remembered-set callback: scavenge a from-space referent and report
    /// whether the slot must stay recorded
    pub fn check_and_scavenge_object(&mut self, slot: Slot) -> SlotCallbackResult {
        match self.heap.load_slot(slot).to_heap_object() {
            Some(object) if self.heap.in_from_space(object) => self.scavenge_object(slot, object),
            Some(object) if self.heap.in_to_space(object) => SlotCallbackResult::Keep,
            _ => SlotCallbackResult::Remove,
        }
    }

    fn evacuate_object(
        &mut self,
        slot: Slot,
        map_word: MapWord,
        map: Map,
        source: HeapObject,
        size: usize,
    ) -> HeapObject {
        if !self.is_incremental_marking {
            if let Some(underlying) = self.collapse_target(&map, source) {
                return self.collapse_into(slot, source, underlying);
            }
        }
        self.evacuate_object_default(slot, map_word, map, source, size)
    }

    /// The string `wrapper` stands for, if it is an indirection that can be
    /// skipped
    fn collapse_target(&self, map: &Map, wrapper: HeapObject) -> Option<HeapObject> {
        let heap = self.heap;
        match map.visitor_id() {
            VisitorId::ThinString => heap
                .load_slot(wrapper.slot_at(THIN_STRING_ACTUAL_OFFSET))
                .to_heap_object(),
            VisitorId::ConsString => {
                let second = heap.load_slot(wrapper.slot_at(CONS_STRING_SECOND_OFFSET));
                if second != Value::from(heap.empty_string()) {
                    return None;
                }
                heap.load_slot(wrapper.slot_at(CONS_STRING_FIRST_OFFSET))
                    .to_heap_object()
            }
            _ => None,
        }
    }

    /// Follow the indirections starting at `target` down to a plain string,
    /// point `slot` at it (evacuated if needed) and forward every wrapper
    /// passed on the way to the same place
    fn collapse_into(&mut self, slot: Slot, wrapper: HeapObject, target: HeapObject) -> HeapObject {
        let heap = self.heap;
        let mut inner_wrappers = Vec::new();
        let mut current = target;
        let target = loop {
            if !heap.in_from_space(current) {
                heap.store_slot(slot, Value::from(current));
                break current;
            }
            let first_word = heap.synchronized_map_word(current);
            if first_word.is_forwarding_address() {
                let forwarded = first_word.to_forwarding_address();
                heap.store_slot(slot, Value::from(forwarded));
                break forwarded;
            }
            let map = heap.maps().get(first_word.to_map());
            if let Some(next) = self.collapse_target(&map, current) {
                inner_wrappers.push(current);
                current = next;
                continue;
            }
            let size = size_from_map(heap.memory(), &map, current);
            break self.evacuate_object_default(slot, first_word, map, current, size);
        };
        // Racing tasks agree on `target`, so a plain store suffices
        let forwarding = MapWord::from_forwarding_address(target);
        heap.set_map_word(wrapper, forwarding, Ordering::Release);
        for inner in inner_wrappers {
            heap.set_map_word(inner, forwarding, Ordering::Release);
        }
        target
    }

    /// Copy within the new space, or promote; fatal when neither fits
    fn evacuate_object_default(
        &mut self,
        slot: Slot,
        map_word: MapWord,
        map: Map,
        source: HeapObject,
        size: usize,
    ) -> HeapObject {
        if !self.heap.should_be_promoted(source, size) {
            // Fragmentation may leave no room in to-space; promote then
            if let Some(target) = self.semi_space_copy_object(slot, map_word, map, source, size) {
                return target;
            }
        }
        if let Some(target) = self.promote_object(slot, map_word, map, source, size) {
            return target;
        }
        if let Some(target) = self.semi_space_copy_object(slot, map_word, map, source, size) {
            return target;
        }
        fatal_process_out_of_memory("Scavenger: semi-space copy", size)
    }

    fn semi_space_copy_object(
        &mut self,
        slot: Slot,
        map_word: MapWord,
        map: Map,
        source: HeapObject,
        size: usize,
    ) -> Option<HeapObject> {
        let address = self.allocator.allocate(AllocationSpace::NewSpace, size)?;
        let target = HeapObject::from_address(address);
        if !self.migrate_object(map_word, map, source, target, size) {
            self.allocator
                .free_last(AllocationSpace::NewSpace, target, size);
            return Some(self.adopt_winner(slot, source));
        }
        self.heap.store_slot(slot, Value::from(target));
        self.copied_list.push((target, size));
        self.copied_size += size;
        if self.is_logging {
            self.survival.record_copied(map.visitor_id(), size);
        }
        Some(target)
    }

    fn promote_object(
        &mut self,
        slot: Slot,
        map_word: MapWord,
        map: Map,
        source: HeapObject,
        size: usize,
    ) -> Option<HeapObject> {
        let address = self.allocator.allocate(AllocationSpace::OldSpace, size)?;
        let target = HeapObject::from_address(address);
        if !self.migrate_object(map_word, map, source, target, size) {
            self.allocator
                .free_last(AllocationSpace::OldSpace, target, size);
            return Some(self.adopt_winner(slot, source));
        }
        self.heap.store_slot(slot, Value::from(target));
        if !map.contains_only_data() {
            self.promotion_list.push((target, size));
        }
        self.promoted_size += size;
        if self.is_logging {
            self.survival.record_promoted(map.visitor_id(), size);
        }
        Some(target)
    }

    /// Another task migrated `source` first; use its copy
    fn adopt_winner(&mut self, slot: Slot, source: HeapObject) -> HeapObject {
        let winner = self.heap.synchronized_map_word(source);
        debug_assert!(winner.is_forwarding_address());
        let target = winner.to_forwarding_address();
        self.heap.store_slot(slot, Value::from(target));
        target
    }

    /// Copy `source` to `target` and try to publish the forwarding address
    ///
    /// Returns false if another task published first.
    fn migrate_object(
        &mut self,
        map_word: MapWord,
        map: Map,
        source: HeapObject,
        target: HeapObject,
        size: usize,
    ) -> bool {
        let heap = self.heap;
        let memory = heap.memory();
        heap.set_map_word(target, map_word, Ordering::Relaxed);
        memory.copy_words(
            target.address() + HEADER_SIZE,
            source.address() + HEADER_SIZE,
            size / WORD_SIZE - 1,
        );

        let published = memory
            .compare_exchange(
                source.address(),
                map_word.raw(),
                MapWord::from_forwarding_address(target).raw(),
                Ordering::Release,
                Ordering::Acquire,
            )
            .is_ok();
        if !published {
            return false;
        }

        if self.is_logging {
            log::trace!(
                "scavenger {}: moved {:?} {:?} -> {:?} ({} bytes)",
                self.task_id,
                map.visitor_id(),
                source,
                target,
                size
            );
        }
        if self.is_incremental_marking {
            heap.marking().transfer_color(source, target);
        }
        heap.update_allocation_site(&map, source, size, &mut self.local_pretenuring_feedback);
        true
    }
}
