//! Scavenger Module - parallel semispace evacuation
//!
//! One [`Scavenger`] per task copies live young objects out of from-space.
//! Work flows through two shared worklists:
//!
//! ```text
//!   roots / remembered set
//!            │ scavenge_object
//!            ▼
//!   ┌─────────────────┐  copy to to-space   ┌──────────────┐
//!   │ from-space obj  │────────────────────►│ CopiedList   │──► ScavengeVisitor
//!   └─────────────────┘                     └──────────────┘        │
//!            │ promote to old space         ┌──────────────┐        │
//!            └─────────────────────────────►│ PromotionList│──► PromotedObjectVisitor
//!                                           └──────────────┘        │
//!                       more from-space referents ◄─────────────────┘
//! ```
//!
//! An object is discovered, copied, and scanned later from its worklist
//! entry; there is no recursion and no visited set. The forwarding address
//! installed in the old copy's map word both breaks cycles and decides
//! races: whichever task wins the CAS owns the copy, the losers give theirs
//! back and adopt the winner's.

pub mod barrier;
mod evacuate;
pub mod job;
pub mod visitors;

pub use barrier::Barrier;
pub use job::{ScavengeJob, ScavengeOutcome};
pub use visitors::{PromotedObjectVisitor, RootScavengeVisitor, ScavengeVisitor};

use crate::heap::{Heap, LocalAllocator, PretenuringFeedbackMap};
use crate::object::{iterate_body, iterate_body_weak, HeapObject, VisitorId};
use crate::stats::SurvivalCounts;
use crate::util::constants::{INTERRUPT_THRESHOLD, SEGMENT_SIZE};
use crate::worklist::{Local, Worklist};

/// Object copied within the new space and its size
pub type CopiedEntry = (HeapObject, usize);

/// Object promoted to old space and its size
pub type PromotionEntry = (HeapObject, usize);

pub type CopiedList = Worklist<CopiedEntry>;
pub type PromotionList = Worklist<PromotionEntry>;

/// Copied objects are drained only while fewer promoted objects than this
/// wait in the local push segment
const PROCESS_PROMOTION_LIST_THRESHOLD: usize = SEGMENT_SIZE / 2;

/// Per-task evacuation state
pub struct Scavenger<'a> {
    heap: &'a Heap,
    task_id: usize,
    copied_list: Local<'a, CopiedEntry>,
    promotion_list: Local<'a, PromotionEntry>,
    local_pretenuring_feedback: PretenuringFeedbackMap,
    copied_size: usize,
    promoted_size: usize,
    allocator: LocalAllocator<'a>,
    is_logging: bool,
    is_incremental_marking: bool,
    is_compacting: bool,
    survival: SurvivalCounts,
}

/// What one scavenger did during a pass
#[derive(Debug, Clone, Default)]
pub struct ScavengerSummary {
    pub task_id: usize,
    pub bytes_copied: usize,
    pub bytes_promoted: usize,
    pub survival: SurvivalCounts,
}

impl<'a> Scavenger<'a> {
    pub fn new(
        heap: &'a Heap,
        is_logging: bool,
        copied_list: &'a CopiedList,
        promotion_list: &'a PromotionList,
        task_id: usize,
    ) -> Self {
        let marking = heap.marking();
        Self {
            heap,
            task_id,
            copied_list: copied_list.local(),
            promotion_list: promotion_list.local(),
            local_pretenuring_feedback: PretenuringFeedbackMap::new(),
            copied_size: 0,
            promoted_size: 0,
            allocator: LocalAllocator::new(heap),
            is_logging,
            is_incremental_marking: marking.is_marking(),
            is_compacting: marking.is_compacting(),
            survival: SurvivalCounts::default(),
        }
    }

    pub fn task_id(&self) -> usize {
        self.task_id
    }

    /// Bytes this task copied within the new space so far
    pub fn bytes_copied(&self) -> usize {
        self.copied_size
    }

    /// Bytes this task promoted so far
    pub fn bytes_promoted(&self) -> usize {
        self.promoted_size
    }

    #[inline]
    fn should_eagerly_process_promotion_list(&self) -> bool {
        self.promotion_list.local_push_segment_size() < PROCESS_PROMOTION_LIST_THRESHOLD
    }

    /// Drain both worklists until a full round finds nothing
    ///
    /// With a barrier, parked siblings are woken every
    /// `INTERRUPT_THRESHOLD` entries while shared work is available.
    pub fn process(&mut self, barrier: Option<&Barrier>) {
        let mut objects = 0usize;
        loop {
            let mut done = true;

            while self.should_eagerly_process_promotion_list() {
                let Some((object, size)) = self.copied_list.pop() else {
                    break;
                };
                self.iterate_and_scavenge_copied_object(object, size);
                done = false;
                if let Some(barrier) = barrier {
                    objects += 1;
                    if objects % INTERRUPT_THRESHOLD == 0 && !self.copied_list.is_global_pool_empty()
                    {
                        barrier.notify_all();
                    }
                }
            }

            while let Some((object, size)) = self.promotion_list.pop() {
                self.iterate_and_scavenge_promoted_object(object, size);
                done = false;
                if let Some(barrier) = barrier {
                    objects += 1;
                    if objects % INTERRUPT_THRESHOLD == 0
                        && !self.promotion_list.is_global_pool_empty()
                    {
                        barrier.notify_all();
                    }
                }
            }

            if done {
                break;
            }
        }
    }

    /// Scan a to-space copy; its host is young so no slot is recorded
    fn iterate_and_scavenge_copied_object(&mut self, object: HeapObject, size: usize) {
        let map = self.heap.map_of(object);
        let mut visitor = ScavengeVisitor::new(self);
        if map.visitor_id() == VisitorId::JsFunction {
            iterate_body_weak(&map, object, size, &mut visitor);
        } else {
            iterate_body(&map, object, size, &mut visitor);
        }
    }

    /// Scan a promoted object, remembering slots that still point into the
    /// new space
    ///
    /// While compacting, slots of black objects that point at evacuation
    /// candidates are recorded for the compactor. The weak next-function
    /// link of functions is left alone.
    pub fn iterate_and_scavenge_promoted_object(&mut self, object: HeapObject, size: usize) {
        let record_slots = self.is_compacting && self.heap.marking().is_black(object);
        let map = self.heap.map_of(object);
        let mut visitor = PromotedObjectVisitor::new(self, record_slots);
        if map.visitor_id() == VisitorId::JsFunction {
            iterate_body_weak(&map, object, size, &mut visitor);
        } else {
            iterate_body(&map, object, size, &mut visitor);
        }
    }

    /// Publish this task's results; runs on the orchestrating thread after
    /// every task finished
    pub fn finalize(mut self) -> ScavengerSummary {
        debug_assert!(self.copied_list.is_local_empty());
        debug_assert!(self.promotion_list.is_local_empty());

        self.heap
            .merge_allocation_site_pretenuring_feedback(&self.local_pretenuring_feedback);
        self.heap
            .increment_semi_space_copied_object_size(self.copied_size);
        self.heap.increment_promoted_objects_size(self.promoted_size);
        self.allocator.finalize();
        if self.is_logging {
            self.heap.stats().record_survival(&self.survival);
        }

        ScavengerSummary {
            task_id: self.task_id,
            bytes_copied: self.copied_size,
            bytes_promoted: self.promoted_size,
            survival: std::mem::take(&mut self.survival),
        }
    }
}
