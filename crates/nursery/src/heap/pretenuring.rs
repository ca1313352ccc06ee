//! Allocation-site pretenuring feedback
//!
//! Objects allocated with a tracking map may be trailed by an allocation
//! memento naming their allocation site. When such an object survives a
//! scavenge the worker bumps a private per-site counter; after the pass the
//! counters are merged into the sites' `memento_found_count` and into a
//! heap-wide feedback table. Decisions based on the counts are made
//! elsewhere.

use super::Heap;
use crate::error::{NurseryError, Result};
use crate::object::layout::{MEMENTO_SITE_OFFSET, SITE_CREATE_COUNT_OFFSET, SITE_FOUND_COUNT_OFFSET};
use crate::object::map::ALLOCATION_MEMENTO_MAP;
use crate::object::{Address, HeapObject, Map, MapWord, Value, VisitorId};
use indexmap::IndexMap;
use std::sync::atomic::Ordering;

/// Allocation site address -> surviving objects found with a memento
pub type PretenuringFeedbackMap = IndexMap<Address, usize>;

impl Heap {
    /// Memento directly behind `object`, if one was allocated with it
    fn find_allocation_memento(&self, object: HeapObject, size: usize) -> Option<HeapObject> {
        let address = object.address() + size;
        let from_space = self.new_space().from_space();
        if !from_space.contains(address) || address >= from_space.top() {
            return None;
        }
        let memento = HeapObject::from_address(address);
        (self.map_word(memento) == MapWord::from_map(ALLOCATION_MEMENTO_MAP)).then_some(memento)
    }

    /// Count a surviving object against its allocation site
    ///
    /// `object` is the from-space original; its memento is never copied.
    pub fn update_allocation_site(
        &self,
        map: &Map,
        object: HeapObject,
        size: usize,
        feedback: &mut PretenuringFeedbackMap,
    ) {
        if !self.config().allocation_site_pretenuring || !map.tracks_allocation_sites() {
            return;
        }
        let Some(memento) = self.find_allocation_memento(object, size) else {
            return;
        };
        let site = self.load_slot(memento.slot_at(MEMENTO_SITE_OFFSET));
        if let Some(site) = site.to_heap_object() {
            *feedback.entry(site.address()).or_insert(0) += 1;
        }
    }

    /// Fold one worker's feedback into the sites and the global table
    pub fn merge_allocation_site_pretenuring_feedback(&self, feedback: &PretenuringFeedbackMap) {
        if feedback.is_empty() {
            return;
        }
        let mut global = self.global_pretenuring_feedback.lock();
        for (&site, &count) in feedback {
            let object = HeapObject::from_address(site);
            if !self.is_allocation_site(object) {
                log::warn!("pretenuring: dropping feedback for non-site {:#x}", site);
                continue;
            }
            self.memory().fetch_add(
                site + SITE_FOUND_COUNT_OFFSET,
                Value::from_smi(count).raw(),
                Ordering::Relaxed,
            );
            *global.entry(site).or_insert(0) += count;
        }
    }

    fn is_allocation_site(&self, object: HeapObject) -> bool {
        if !self.memory().contains(object.address()) {
            return false;
        }
        let word = self.map_word(object);
        !word.is_forwarding_address()
            && self
                .maps()
                .try_get(word.to_map())
                .is_some_and(|map| map.visitor_id() == VisitorId::AllocationSite)
    }

    fn site_counter(&self, site: HeapObject, offset: usize) -> Result<usize> {
        if !self.is_allocation_site(site) {
            return Err(NurseryError::InvalidArgument(format!(
                "{:?} is not an allocation site",
                site
            )));
        }
        Ok(self.load_slot(site.slot_at(offset)).to_smi().unwrap_or(0))
    }

    /// Surviving objects found with a memento for `site`
    pub fn allocation_site_found_count(&self, site: HeapObject) -> Result<usize> {
        self.site_counter(site, SITE_FOUND_COUNT_OFFSET)
    }

    /// Objects allocated with a memento for `site`
    pub fn allocation_site_create_count(&self, site: HeapObject) -> Result<usize> {
        self.site_counter(site, SITE_CREATE_COUNT_OFFSET)
    }

    /// Snapshot of the heap-wide feedback table
    pub fn global_pretenuring_feedback(&self) -> PretenuringFeedbackMap {
        self.global_pretenuring_feedback.lock().clone()
    }

    pub fn reset_pretenuring_feedback(&self) {
        self.global_pretenuring_feedback.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScavengerConfig;
    use crate::heap::AllocationSpace;
    use crate::util::constants::KB;

    fn heap() -> Heap {
        Heap::new(ScavengerConfig {
            semi_space_size: 64 * KB,
            old_space_size: 64 * KB,
            max_handles: 16,
            lab_size: 4 * KB,
            max_lab_object_size: 2 * KB,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_memento_found_after_flip() {
        let heap = heap();
        let site = heap.new_allocation_site().unwrap();
        let map_id = heap.register_struct_map(1, 0, true).unwrap();
        let object = heap
            .new_struct_with_memento(map_id, &[Value::UNDEFINED], &[], site)
            .unwrap();
        heap.new_space().flip();

        let map = heap.map_of(object);
        let mut feedback = PretenuringFeedbackMap::new();
        heap.update_allocation_site(&map, object, heap.size_of(object), &mut feedback);
        heap.update_allocation_site(&map, object, heap.size_of(object), &mut feedback);
        assert_eq!(feedback[&site.address()], 2);

        heap.merge_allocation_site_pretenuring_feedback(&feedback);
        assert_eq!(heap.allocation_site_found_count(site).unwrap(), 2);
        assert_eq!(heap.global_pretenuring_feedback()[&site.address()], 2);

        heap.reset_pretenuring_feedback();
        assert!(heap.global_pretenuring_feedback().is_empty());
    }

    #[test]
    fn test_no_memento_no_feedback() {
        let heap = heap();
        let map_id = heap.register_struct_map(1, 0, true).unwrap();
        let object = heap
            .new_struct(map_id, &[Value::UNDEFINED], &[], AllocationSpace::NewSpace)
            .unwrap();
        // A plain neighbour right behind the object is not a memento
        heap.new_fixed_array(&[], AllocationSpace::NewSpace).unwrap();
        heap.new_space().flip();

        let mut feedback = PretenuringFeedbackMap::new();
        heap.update_allocation_site(&heap.map_of(object), object, heap.size_of(object), &mut feedback);
        assert!(feedback.is_empty());
    }

    #[test]
    fn test_memento_past_top_ignored() {
        let heap = heap();
        let map_id = heap.register_struct_map(1, 0, true).unwrap();
        let object = heap
            .new_struct(map_id, &[Value::UNDEFINED], &[], AllocationSpace::NewSpace)
            .unwrap();
        heap.new_space().flip();

        let mut feedback = PretenuringFeedbackMap::new();
        heap.update_allocation_site(&heap.map_of(object), object, heap.size_of(object), &mut feedback);
        assert!(feedback.is_empty());
    }

    #[test]
    fn test_disabled_pretenuring() {
        let heap = Heap::new(ScavengerConfig {
            semi_space_size: 64 * KB,
            old_space_size: 64 * KB,
            max_handles: 16,
            lab_size: 4 * KB,
            max_lab_object_size: 2 * KB,
            allocation_site_pretenuring: false,
            ..Default::default()
        })
        .unwrap();
        let site = heap.new_allocation_site().unwrap();
        let map_id = heap.register_struct_map(1, 0, true).unwrap();
        let object = heap
            .new_struct_with_memento(map_id, &[Value::UNDEFINED], &[], site)
            .unwrap();
        heap.new_space().flip();

        let mut feedback = PretenuringFeedbackMap::new();
        heap.update_allocation_site(&heap.map_of(object), object, heap.size_of(object), &mut feedback);
        assert!(feedback.is_empty());
    }
}
