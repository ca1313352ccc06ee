//! Scavenge Edge Case Tests - Boundary Behavior Verification
//!
//! These tests verify the less common paths of a pass:
//! - Remembered-set slot retention and removal
//! - Slot recording for a compacting marker
//! - Weak handles and weak function links
//! - Allocation-site pretenuring feedback
//! - Marking colour transfer
//!
//! ============================================================================
//! EACH TEST FINDS SPECIFIC EDGE CASE BUGS - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use common::{
    assert_in_old_space, assert_in_to_space, assert_no_from_space_references,
    assert_survivor_count, HeapFixture, KB,
};
use nursery::heap::Color;
use nursery::{AllocationSpace, HeapObject, Value, VisitorId};

fn large_array_pointing_at(fixture: &HeapFixture, target: HeapObject) -> HeapObject {
    let mut elements = vec![Value::from_smi(0); 200];
    elements[5] = Value::from(target);
    fixture
        .heap
        .new_fixed_array(&elements, AllocationSpace::NewSpace)
        .unwrap()
}

/// ============================================================================
/// REMEMBERED SET TESTS
/// ============================================================================

/// Old-to-new slots stay recorded while the target is young
///
/// **Bug this finds:** Slots dropped too early, or kept after promotion
/// **Invariant verified:** Keep while young, Remove once old
#[test]
fn test_remembered_slot_lifecycle() {
    // Arrange
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let host = fixture.old_node(1);
    fixture.link(host, 0, fixture.node(2));
    let slot = host.slot_at(8);
    assert!(heap.remembered_set().contains(slot), "write barrier missed");

    // Act - first survival keeps it young
    fixture.scavenge();

    // Assert
    let child = fixture.edge(host, 0).unwrap();
    assert_in_to_space(heap, child, "first survival");
    assert!(heap.remembered_set().contains(slot), "young target's slot dropped");

    // Act - second survival promotes it
    fixture.scavenge();

    // Assert
    let child = fixture.edge(host, 0).unwrap();
    assert_in_old_space(heap, child, "second survival");
    assert_eq!(fixture.node_id(child), 2);
    assert!(!heap.remembered_set().contains(slot), "old target's slot kept");
}

/// Slots overwritten with non-pointers are dropped
#[test]
fn test_stale_remembered_slot_removed() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let host = fixture.old_node(1);
    fixture.link(host, 1, fixture.node(2));
    heap.write_field(host, 1, Value::from_smi(5)).unwrap();

    let outcome = fixture.scavenge();

    assert_eq!(outcome.remembered_set_pages, 1);
    assert!(heap.remembered_set().is_empty(), "stale slot survived the pass");
    assert_survivor_count(heap, 0, "overwritten child is garbage");
}

/// ============================================================================
/// COMPACTION SLOT RECORDING TESTS
/// ============================================================================

/// A black promoted object records slots into evacuation candidates
///
/// **Bug this finds:** Compactor misses references created by promotion
#[test]
fn test_promoted_black_object_records_candidate_slots() {
    // Arrange
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let target = fixture.old_node(1);
    let array = large_array_pointing_at(&fixture, target);
    let root = fixture.root(array);
    heap.marking().start_marking(true);
    heap.marking().add_evacuation_candidate(target.address());
    heap.marking().mark_black(array);

    // Act
    fixture.scavenge();

    // Assert
    let promoted = fixture.rooted(root);
    assert_in_old_space(heap, promoted, "large array");
    assert!(heap.marking().is_black(promoted), "colour not transferred");
    let recorded = heap.marking().recorded_slots();
    assert_eq!(recorded.len(), 1, "recorded {:?}", recorded);
    assert_eq!(recorded[0].host, promoted);
    assert_eq!(recorded[0].target, target);
    assert_eq!(heap.load_slot(recorded[0].slot), Value::from(target));
    heap.marking().stop_marking();
}

/// No recording without compaction
#[test]
fn test_no_slot_recording_when_not_compacting() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let target = fixture.old_node(1);
    let array = large_array_pointing_at(&fixture, target);
    fixture.root(array);
    heap.marking().start_marking(false);
    heap.marking().add_evacuation_candidate(target.address());
    heap.marking().mark_black(array);

    fixture.scavenge();

    assert!(heap.marking().recorded_slots().is_empty());
    heap.marking().stop_marking();
}

/// No recording for objects the marker has not finished
#[test]
fn test_no_slot_recording_for_white_object() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let target = fixture.old_node(1);
    let array = large_array_pointing_at(&fixture, target);
    fixture.root(array);
    heap.marking().start_marking(true);
    heap.marking().add_evacuation_candidate(target.address());

    fixture.scavenge();

    assert!(heap.marking().recorded_slots().is_empty());
    heap.marking().stop_marking();
}

/// Copies inherit the colour of their original
#[test]
fn test_marking_colour_follows_copy() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let grey = fixture.node(1);
    let black = fixture.node(2);
    let white = fixture.node(3);
    let handles = [fixture.root(grey), fixture.root(black), fixture.root(white)];
    heap.marking().start_marking(false);
    heap.marking().mark_grey(grey);
    heap.marking().mark_black(black);

    fixture.scavenge();

    let colours: Vec<Color> = handles
        .iter()
        .map(|handle| heap.marking().color(fixture.rooted(*handle)))
        .collect();
    assert_eq!(colours, vec![Color::Grey, Color::Black, Color::White]);
    heap.marking().stop_marking();
}

/// ============================================================================
/// WEAK REFERENCE TESTS
/// ============================================================================

/// Weak handles follow survivors and are cleared for the dead
///
/// **Bug this finds:** Weak handle keeping an object alive, dangling weak handle
#[test]
fn test_weak_handles_updated_or_cleared() {
    // Arrange
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let doomed = fixture.node(1);
    let kept = fixture.node(2);
    let old = fixture.old_node(3);
    let weak_doomed = heap.create_weak_handle(Value::from(doomed)).unwrap();
    let weak_kept = heap.create_weak_handle(Value::from(kept)).unwrap();
    let weak_old = heap.create_weak_handle(Value::from(old)).unwrap();
    let weak_smi = heap.create_weak_handle(Value::from_smi(11)).unwrap();
    let strong_kept = fixture.root(kept);

    // Act
    let outcome = fixture.scavenge();

    // Assert
    assert_eq!(outcome.weak_handles_cleared, 1);
    assert_eq!(heap.handle_value(weak_doomed).unwrap(), Value::UNDEFINED);
    assert_eq!(
        heap.handle_object(weak_kept).unwrap(),
        Some(fixture.rooted(strong_kept)),
        "weak handle not forwarded"
    );
    assert_eq!(heap.handle_object(weak_old).unwrap(), Some(old));
    assert_eq!(heap.handle_value(weak_smi).unwrap(), Value::from_smi(11));
    assert_survivor_count(heap, 1, "weak handles keep nothing alive");
}

/// The next-function link of a copied function is not traced
///
/// **Bug this finds:** Weak list keeping dead functions alive
#[test]
fn test_function_next_link_not_traced_when_copied() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let function = heap
        .new_function(Value::from_smi(1), Value::UNDEFINED, AllocationSpace::NewSpace)
        .unwrap();
    let context = fixture.node(5);
    heap.write_field(function, 1, Value::from(context)).unwrap();
    let linked = fixture.node(6);
    heap.write_field(function, 2, Value::from(linked)).unwrap();
    let root = fixture.root(function);

    fixture.scavenge();

    let moved = fixture.rooted(root);
    assert_eq!(heap.visitor_id(moved), VisitorId::JsFunction);
    let context2 = heap.read_field(moved, 1).unwrap().to_heap_object().unwrap();
    assert_in_to_space(heap, context2, "context is strong");
    assert_eq!(
        heap.read_field(moved, 2).unwrap(),
        Value::from(linked),
        "weak link was followed"
    );
    assert_survivor_count(heap, 2, "function and context only");
}

/// The next-function link of a promoted function is not traced either
#[test]
fn test_function_next_link_not_traced_when_promoted() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let function = heap
        .new_function(Value::UNDEFINED, Value::UNDEFINED, AllocationSpace::NewSpace)
        .unwrap();
    let root = fixture.root(function);
    fixture.scavenge();

    let linked = fixture.node(6);
    heap.write_field(fixture.rooted(root), 2, Value::from(linked)).unwrap();
    fixture.scavenge();

    let promoted = fixture.rooted(root);
    assert_in_old_space(heap, promoted, "function on second survival");
    assert_eq!(heap.read_field(promoted, 2).unwrap(), Value::from(linked));
    assert!(
        !heap.remembered_set().contains(promoted.slot_at(24)),
        "weak link recorded as old-to-new"
    );
    assert_survivor_count(heap, 0, "linked node is garbage");
}

/// ============================================================================
/// PRETENURING TESTS
/// ============================================================================

/// Surviving objects with mementos are counted against their site
///
/// **Bug this finds:** Dead objects counted, counts merged twice
#[test]
fn test_pretenuring_feedback_counts_survivors() {
    // Arrange - three objects from one site, two of them live
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let tracked = heap.register_struct_map(1, 1, true).unwrap();
    let site = heap.new_allocation_site().unwrap();
    let objects: Vec<HeapObject> = (0..3)
        .map(|i| {
            heap.new_struct_with_memento(tracked, &[Value::UNDEFINED], &[i], site)
                .unwrap()
        })
        .collect();
    fixture.root(objects[0]);
    fixture.root(objects[2]);
    assert_eq!(heap.allocation_site_create_count(site).unwrap(), 3);

    // Act
    fixture.scavenge();

    // Assert
    assert_eq!(heap.allocation_site_found_count(site).unwrap(), 2);
    assert_eq!(heap.global_pretenuring_feedback().get(&site.address()), Some(&2));

    // Copies carry no memento, so a second pass adds nothing
    fixture.scavenge();
    assert_eq!(heap.allocation_site_found_count(site).unwrap(), 2);
    assert_eq!(heap.allocation_site_create_count(site).unwrap(), 3);

    heap.reset_pretenuring_feedback();
    assert!(heap.global_pretenuring_feedback().is_empty());
}

/// ============================================================================
/// OBJECT KIND TESTS
/// ============================================================================

/// Large data-only objects are promoted and left unscanned
#[test]
fn test_large_byte_array_promoted_without_slots() {
    let fixture = HeapFixture::single_threaded();
    let heap = &fixture.heap;
    let bytes: Vec<u8> = (0..2 * KB).map(|i| (i % 251) as u8).collect();
    let array = heap.new_byte_array(&bytes, AllocationSpace::NewSpace).unwrap();
    let root = fixture.root(array);

    let outcome = fixture.scavenge();

    let promoted = fixture.rooted(root);
    assert_in_old_space(heap, promoted, "large byte array");
    assert_eq!(heap.byte_array_bytes(promoted).unwrap(), bytes);
    assert_eq!(outcome.bytes_promoted, heap.size_of(promoted));
    assert!(heap.remembered_set().is_empty());
}

/// An empty heap survives a pass untouched
#[test]
fn test_scavenge_with_nothing_young() {
    let fixture = HeapFixture::single_threaded();
    let old = fixture.root(fixture.old_node(1));

    let outcome = fixture.scavenge();

    assert_eq!(outcome.bytes_copied, 0);
    assert_eq!(outcome.bytes_promoted, 0);
    assert_eq!(outcome.remembered_set_pages, 0);
    assert_eq!(fixture.node_id(fixture.rooted(old)), 1);
    assert_no_from_space_references(&fixture.heap, "empty pass");
}
