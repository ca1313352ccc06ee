//! Slot visitors driving the scavenger
//!
//! - [`RootScavengeVisitor`]: strong roots
//! - [`ScavengeVisitor`]: bodies of objects copied within the new space
//! - [`PromotedObjectVisitor`]: bodies of promoted objects, which are old
//!   hosts and therefore feed the remembered set and the compactor

use super::Scavenger;
use crate::heap::{Root, RootVisitor, SlotCallbackResult};
use crate::object::{HeapObject, ObjectVisitor, Slot};

/// Scavenges every from-space object referenced from a root
pub struct RootScavengeVisitor<'s, 'a> {
    scavenger: &'s mut Scavenger<'a>,
}

impl<'s, 'a> RootScavengeVisitor<'s, 'a> {
    pub fn new(scavenger: &'s mut Scavenger<'a>) -> Self {
        Self { scavenger }
    }
}

impl RootVisitor for RootScavengeVisitor<'_, '_> {
    fn visit_root_pointer(&mut self, _root: Root, slot: Slot) {
        let heap = self.scavenger.heap;
        if let Some(object) = heap.load_slot(slot).to_heap_object() {
            if heap.in_from_space(object) {
                self.scavenger.scavenge_object(slot, object);
            }
        }
    }
}

/// Body visitor for to-space copies
pub struct ScavengeVisitor<'s, 'a> {
    scavenger: &'s mut Scavenger<'a>,
}

impl<'s, 'a> ScavengeVisitor<'s, 'a> {
    pub fn new(scavenger: &'s mut Scavenger<'a>) -> Self {
        Self { scavenger }
    }
}

impl ObjectVisitor for ScavengeVisitor<'_, '_> {
    fn visit_pointers(&mut self, _host: HeapObject, start: Slot, end: Slot) {
        let heap = self.scavenger.heap;
        for slot in Slot::range(start, end) {
            if let Some(object) = heap.load_slot(slot).to_heap_object() {
                if heap.in_from_space(object) {
                    self.scavenger.scavenge_object(slot, object);
                }
            }
        }
    }
}

/// Body visitor for promoted objects
pub struct PromotedObjectVisitor<'s, 'a> {
    scavenger: &'s mut Scavenger<'a>,
    record_slots: bool,
}

impl<'s, 'a> PromotedObjectVisitor<'s, 'a> {
    pub fn new(scavenger: &'s mut Scavenger<'a>, record_slots: bool) -> Self {
        Self {
            scavenger,
            record_slots,
        }
    }

    fn handle_slot(&mut self, host: HeapObject, slot: Slot, target: HeapObject) {
        let heap = self.scavenger.heap;
        if heap.in_from_space(target) {
            if self.scavenger.scavenge_object(slot, target) == SlotCallbackResult::Keep {
                heap.remembered_set().insert(slot);
            }
        } else if self.record_slots && heap.marking().is_on_evacuation_candidate(target) {
            heap.marking().record_slot(host, slot, target);
        }
    }
}

impl ObjectVisitor for PromotedObjectVisitor<'_, '_> {
    fn visit_pointers(&mut self, host: HeapObject, start: Slot, end: Slot) {
        let heap = self.scavenger.heap;
        for slot in Slot::range(start, end) {
            if let Some(target) = heap.load_slot(slot).to_heap_object() {
                self.handle_slot(host, slot, target);
            }
        }
    }
}
