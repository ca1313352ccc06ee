//! Test Utilities for the Nursery Test Suite
//!
//! Fixtures build small heaps and object graphs; the assertion helpers are
//! strict and report the calling test's location.
//!
//! ============================================================================
//! Graph nodes are structs with two pointer fields and one data word holding
//! a unique id, so survivors can be matched to their originals after a move.
//! ============================================================================

#![allow(dead_code)]

use nursery::object::{iterate_body, iterate_body_weak, ObjectVisitor};
use nursery::{
    AllocationSpace, Handle, Heap, HeapObject, MapId, ScavengeOutcome, ScavengerConfig, Slot,
    SpaceId, Value, VisitorId,
};
use std::collections::{HashMap, HashSet, VecDeque};

pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Pointer fields of a graph node
pub const NODE_EDGES: usize = 2;

/// Byte size of a graph node
pub const NODE_SIZE: usize = 8 * (1 + NODE_EDGES + 1);

/// ============================================================================
/// HEAP FIXTURE
/// ============================================================================

pub struct HeapFixture {
    pub heap: Heap,
    pub node_map: MapId,
}

impl HeapFixture {
    /// One task, small spaces
    pub fn single_threaded() -> Self {
        Self::with_config(ScavengerConfig {
            semi_space_size: 256 * KB,
            old_space_size: MB,
            max_handles: 512,
            large_object_threshold: KB,
            lab_size: 4 * KB,
            max_lab_object_size: 2 * KB,
            parallel_scavenge: false,
            ..Default::default()
        })
    }

    /// Exactly `tasks` scavenger tasks
    pub fn parallel(tasks: usize) -> Self {
        Self::with_config(ScavengerConfig {
            semi_space_size: 4 * MB,
            old_space_size: 8 * MB,
            max_handles: 4096,
            large_object_threshold: KB,
            lab_size: 8 * KB,
            max_lab_object_size: 2 * KB,
            parallel_scavenge: true,
            scavenge_tasks: Some(tasks),
            max_scavenge_tasks: tasks,
            ..Default::default()
        })
    }

    pub fn with_config(config: ScavengerConfig) -> Self {
        let heap = Heap::new(config).expect("heap construction should succeed with valid config");
        let node_map = heap
            .register_struct_map(NODE_EDGES, 1, false)
            .expect("node map registration should succeed");
        Self { heap, node_map }
    }

    /// Young node with empty edges
    pub fn node(&self, id: usize) -> HeapObject {
        self.node_in(id, AllocationSpace::NewSpace)
    }

    /// Old node with empty edges
    pub fn old_node(&self, id: usize) -> HeapObject {
        self.node_in(id, AllocationSpace::OldSpace)
    }

    fn node_in(&self, id: usize, space: AllocationSpace) -> HeapObject {
        self.heap
            .new_struct(self.node_map, &[Value::UNDEFINED; NODE_EDGES], &[id], space)
            .unwrap_or_else(|e| panic!("allocating node {} failed: {:?}", id, e))
    }

    /// Set edge `index` of `from` to `to` through the write barrier
    pub fn link(&self, from: HeapObject, index: usize, to: HeapObject) {
        self.heap
            .write_field(from, index, Value::from(to))
            .unwrap_or_else(|e| panic!("linking {:?} -> {:?} failed: {:?}", from, to, e));
    }

    pub fn edge(&self, object: HeapObject, index: usize) -> Option<HeapObject> {
        self.heap
            .read_field(object, index)
            .expect("edge read should succeed")
            .to_heap_object()
    }

    pub fn node_id(&self, object: HeapObject) -> usize {
        self.heap
            .read_field(object, NODE_EDGES)
            .expect("id read should succeed")
            .raw()
    }

    pub fn root(&self, object: HeapObject) -> Handle {
        self.heap
            .create_handle(Value::from(object))
            .expect("handle creation should succeed")
    }

    /// Current target of a strong handle
    pub fn rooted(&self, handle: Handle) -> HeapObject {
        self.heap
            .handle_object(handle)
            .expect("handle should be live")
            .expect("handle should hold an object")
    }

    pub fn scavenge(&self) -> ScavengeOutcome {
        self.heap.scavenge()
    }

    /// Every object reachable from the strong handles
    ///
    /// Weak function links are not followed.
    pub fn reachable(&self) -> Vec<HeapObject> {
        let heap = &self.heap;
        let mut seen = HashSet::new();
        let mut queue: VecDeque<HeapObject> = heap
            .handles()
            .strong_slots()
            .filter_map(|slot| heap.load_slot(slot).to_heap_object())
            .collect();
        let mut order = Vec::new();
        while let Some(object) = queue.pop_front() {
            if !seen.insert(object) {
                continue;
            }
            order.push(object);
            queue.extend(pointers_of(heap, object));
        }
        order
    }

    /// Ids of every reachable node
    pub fn reachable_ids(&self) -> HashSet<usize> {
        self.reachable()
            .into_iter()
            .filter(|object| self.heap.map_id_of(*object) == self.node_map)
            .map(|object| self.node_id(object))
            .collect()
    }
}

struct CollectPointers<'h> {
    heap: &'h Heap,
    targets: Vec<HeapObject>,
}

impl ObjectVisitor for CollectPointers<'_> {
    fn visit_pointers(&mut self, _host: HeapObject, start: Slot, end: Slot) {
        for slot in Slot::range(start, end) {
            if let Some(target) = self.heap.load_slot(slot).to_heap_object() {
                self.targets.push(target);
            }
        }
    }
}

/// Strong outgoing pointers of a live object
pub fn pointers_of(heap: &Heap, object: HeapObject) -> Vec<HeapObject> {
    let map = heap.map_of(object);
    let size = heap.size_of(object);
    let mut visitor = CollectPointers {
        heap,
        targets: Vec::new(),
    };
    if map.visitor_id() == VisitorId::JsFunction {
        iterate_body_weak(&map, object, size, &mut visitor);
    } else {
        iterate_body(&map, object, size, &mut visitor);
    }
    visitor.targets
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

#[track_caller]
pub fn assert_in_to_space(heap: &Heap, object: HeapObject, context: &str) {
    assert!(
        heap.in_to_space(object),
        "{}: {:?} expected in to-space",
        context,
        object
    );
}

#[track_caller]
pub fn assert_in_old_space(heap: &Heap, object: HeapObject, context: &str) {
    assert!(
        heap.in_old_space(object),
        "{}: {:?} expected in old space",
        context,
        object
    );
}

/// No live object in to-space or old space may point into from-space
///
/// **Bug this finds:** Slots left at stale addresses after evacuation
#[track_caller]
pub fn assert_no_from_space_references(heap: &Heap, context: &str) {
    for space in [SpaceId::ToSpace, SpaceId::OldSpace] {
        let objects = heap
            .objects_in(space)
            .unwrap_or_else(|e| panic!("{}: {:?} not iterable: {:?}", context, space, e));
        for object in objects {
            for target in pointers_of(heap, object) {
                assert!(
                    !heap.in_from_space(target),
                    "{}: {:?} in {:?} still points at from-space {:?}",
                    context,
                    object,
                    space,
                    target
                );
            }
        }
    }
    for slot in heap.handles().strong_slots() {
        if let Some(target) = heap.load_slot(slot).to_heap_object() {
            assert!(
                !heap.in_from_space(target),
                "{}: root {:?} still points at from-space {:?}",
                context,
                slot,
                target
            );
        }
    }
}

/// Each node id is held by exactly one object in to-space and old space
///
/// **Bug this finds:** Objects copied twice by racing tasks
#[track_caller]
pub fn assert_nodes_unique(fixture: &HeapFixture, context: &str) -> HashMap<usize, HeapObject> {
    let heap = &fixture.heap;
    let mut by_id = HashMap::new();
    for space in [SpaceId::ToSpace, SpaceId::OldSpace] {
        let objects = heap
            .objects_in(space)
            .unwrap_or_else(|e| panic!("{}: {:?} not iterable: {:?}", context, space, e));
        for object in objects {
            if heap.map_id_of(object) != fixture.node_map {
                continue;
            }
            let id = fixture.node_id(object);
            if let Some(previous) = by_id.insert(id, object) {
                panic!(
                    "{}: node {} exists twice, at {:?} and {:?}",
                    context, id, previous, object
                );
            }
        }
    }
    by_id
}

#[track_caller]
pub fn assert_survivor_count(heap: &Heap, expected: usize, context: &str) {
    let survivors = heap
        .objects_in(SpaceId::ToSpace)
        .unwrap_or_else(|e| panic!("{}: to-space not iterable: {:?}", context, e));
    assert_eq!(
        survivors.len(),
        expected,
        "{}: to-space holds {:?}",
        context,
        survivors
    );
}
