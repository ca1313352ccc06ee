//! Body descriptors - where the pointers of an object live
//!
//! A body descriptor turns (map, object) into the size of the object and
//! the ranges of tagged slots a visitor must look at. Two layouts exist:
//!
//! 1. **Strong layout** ([`iterate_body`]) - every tagged field.
//! 2. **Weak layout** ([`iterate_body_weak`]) - same, except the weak
//!    `next_function_link` of functions is skipped. The weak function list
//!    is reconciled outside the scavenger.
//!
//! Slot ranges are handed over as `[start, end)` so visitors can walk them
//! without re-deriving the layout per field.

use super::layout::*;
use super::map::{Map, VisitorId};
use super::value::{HeapObject, Slot, Value};
use crate::memory::Memory;
use crate::util::constants::WORD_SIZE;
use std::sync::atomic::Ordering;

/// Receives the tagged slots of an object body
pub trait ObjectVisitor {
    /// Visit the slots `[start, end)` of `host`
    fn visit_pointers(&mut self, host: HeapObject, start: Slot, end: Slot);
}

/// Read a Smi length word
#[inline]
fn length_of(memory: &Memory, object: HeapObject) -> usize {
    let raw = memory.load(object.address() + LENGTH_OFFSET, Ordering::Relaxed);
    Value::from_raw(raw).to_smi().unwrap_or(0)
}

/// Size in bytes of `object`, whose map is `map`
pub fn size_from_map(memory: &Memory, map: &Map, object: HeapObject) -> usize {
    if let Some(size) = map.instance_size() {
        return size;
    }
    match map.visitor_id() {
        VisitorId::FixedArray => fixed_array_size(length_of(memory, object)),
        VisitorId::ByteArray | VisitorId::SeqString => {
            byte_array_size(length_of(memory, object))
        }
        VisitorId::FreeSpace => {
            let raw = memory.load(object.address() + FREE_SPACE_SIZE_OFFSET, Ordering::Relaxed);
            Value::from_raw(raw).to_smi().unwrap_or(WORD_SIZE)
        }
        other => unreachable!("{:?} maps carry an instance size", other),
    }
}

/// Visit every tagged slot of `object`
pub fn iterate_body<V: ObjectVisitor>(
    map: &Map,
    object: HeapObject,
    size: usize,
    visitor: &mut V,
) {
    iterate(map, object, size, visitor, true)
}

/// Visit every strong tagged slot of `object`
pub fn iterate_body_weak<V: ObjectVisitor>(
    map: &Map,
    object: HeapObject,
    size: usize,
    visitor: &mut V,
) {
    iterate(map, object, size, visitor, false)
}

fn iterate<V: ObjectVisitor>(
    map: &Map,
    object: HeapObject,
    size: usize,
    visitor: &mut V,
    include_weak: bool,
) {
    let (start, end) = match map.visitor_id() {
        VisitorId::Struct => (HEADER_SIZE, HEADER_SIZE + map.pointer_fields() * WORD_SIZE),
        VisitorId::FixedArray => (ARRAY_HEADER_SIZE, size),
        VisitorId::ThinString => (THIN_STRING_ACTUAL_OFFSET, THIN_STRING_SIZE),
        VisitorId::ConsString => (CONS_STRING_FIRST_OFFSET, CONS_STRING_SIZE),
        VisitorId::JsFunction if include_weak => (FUNCTION_SHARED_OFFSET, FUNCTION_SIZE),
        VisitorId::JsFunction => (FUNCTION_SHARED_OFFSET, FUNCTION_NEXT_LINK_OFFSET),
        VisitorId::AllocationMemento => (MEMENTO_SITE_OFFSET, ALLOCATION_MEMENTO_SIZE),
        // Counts are Smis
        VisitorId::AllocationSite => return,
        VisitorId::ByteArray
        | VisitorId::SeqString
        | VisitorId::Filler
        | VisitorId::FreeSpace => return,
    };
    if start < end {
        visitor.visit_pointers(object, object.slot_at(start), object.slot_at(end));
    }
}
