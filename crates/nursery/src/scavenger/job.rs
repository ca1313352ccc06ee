//! ScavengeJob - one young-generation collection
//!
//! ## Phases
//!
//! 1. **Flip**: from-space and to-space swap, to-space starts empty
//! 2. **Parallel**: every task claims chunks of strong root slots, then
//!    remembered-set pages, then drains the shared worklists until the
//!    barrier reports global termination
//! 3. **Weak handles**: updated to the new copy or cleared
//! 4. **Finalize**: LABs closed, feedback and counters merged, age mark set
//!
//! Mutators must not run during a pass.

use super::{Barrier, CopiedList, PromotionList, RootScavengeVisitor, Scavenger, ScavengerSummary};
use crate::heap::{Heap, Root, RootVisitor};
use crate::logging::{log_event, ScavengeEvent};
use crate::object::{Slot, Value};
use crate::stats::{ScavengeTimer, SurvivalCounts};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Result of one scavenge
#[derive(Debug, Clone, Serialize)]
pub struct ScavengeOutcome {
    /// Pass number, starting at 1
    pub pass: u64,
    pub tasks: usize,
    pub bytes_copied: usize,
    pub bytes_promoted: usize,
    pub duration: Duration,
    /// Old-space pages with recorded slots when the pass started
    pub remembered_set_pages: usize,
    pub weak_handles_cleared: usize,
}

/// Root slots claimed per cursor step
const ROOT_CHUNK_SIZE: usize = 64;

/// Work handed out to tasks through claim cursors
struct SharedWork {
    roots: Vec<Slot>,
    root_cursor: AtomicUsize,
    /// Old-space pages with recorded slots
    pages: Vec<usize>,
    page_cursor: AtomicUsize,
}

impl SharedWork {
    fn new(roots: Vec<Slot>, pages: Vec<usize>) -> Self {
        Self {
            roots,
            root_cursor: AtomicUsize::new(0),
            pages,
            page_cursor: AtomicUsize::new(0),
        }
    }

    /// Next unclaimed run of root slots, empty once all are taken
    fn claim_roots(&self) -> &[Slot] {
        let start = self
            .root_cursor
            .fetch_add(ROOT_CHUNK_SIZE, Ordering::Relaxed)
            .min(self.roots.len());
        let end = (start + ROOT_CHUNK_SIZE).min(self.roots.len());
        &self.roots[start..end]
    }

    fn claim_page(&self) -> Option<usize> {
        let index = self.page_cursor.fetch_add(1, Ordering::Relaxed);
        self.pages.get(index).copied()
    }
}

/// Orchestrates one pass over the heap
pub struct ScavengeJob<'h> {
    heap: &'h Heap,
}

/// Ends the barrier episode if a task unwinds, so siblings stop waiting
struct AbortOnPanic<'b>(&'b Barrier);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

impl<'h> ScavengeJob<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self { heap }
    }

    /// Run the pass to completion
    pub fn run(self) -> ScavengeOutcome {
        let heap = self.heap;
        let _relocation = heap.relocation_lock();
        let timer = ScavengeTimer::start();
        let pass = heap.next_gc_count();
        let config = heap.config();

        let new_space_used = heap.new_space_used();
        heap.new_space().flip();
        heap.reset_survival_counters();

        let tasks = heap.number_of_scavenge_tasks();
        let mut roots = Vec::new();
        heap.iterate_roots(&mut roots);
        let work = SharedWork::new(roots, heap.remembered_set().pages_with_slots());
        let remembered_set_pages = work.pages.len();
        log::debug!(
            "scavenge {}: {} tasks, {} roots, {} remembered-set pages, {} bytes in from-space",
            pass,
            tasks,
            work.roots.len(),
            remembered_set_pages,
            new_space_used
        );
        log_event(ScavengeEvent::PassStart {
            pass,
            tasks,
            remembered_set_pages,
            new_space_used,
        });

        let copied_list = CopiedList::new();
        let promotion_list = PromotionList::new();
        let barrier = Barrier::new();
        let mut scavengers: Vec<Scavenger<'_>> = (0..tasks)
            .map(|id| Scavenger::new(heap, config.verbose, &copied_list, &promotion_list, id))
            .collect();

        let durations = Self::run_tasks(&mut scavengers, &barrier, &work);

        if config.trace_parallel_scavenge {
            for (scavenger, duration) in scavengers.iter().zip(&durations) {
                log::debug!(
                    "scavenge {}: task {} took {:?}, copied {} bytes, promoted {} bytes",
                    pass,
                    scavenger.task_id(),
                    duration,
                    scavenger.bytes_copied(),
                    scavenger.bytes_promoted()
                );
            }
        }
        for (scavenger, duration) in scavengers.iter().zip(&durations) {
            log_event(ScavengeEvent::TaskFinished {
                pass,
                task_id: scavenger.task_id(),
                duration_ms: duration.as_secs_f64() * 1000.0,
                bytes_copied: scavenger.bytes_copied(),
                bytes_promoted: scavenger.bytes_promoted(),
            });
        }

        let weak_handles_cleared = Self::process_weak_handles(heap);

        let summaries: Vec<ScavengerSummary> =
            scavengers.into_iter().map(Scavenger::finalize).collect();
        debug_assert!(copied_list.is_global_empty());
        debug_assert!(promotion_list.is_global_empty());

        let new_space = heap.new_space();
        new_space.set_age_mark(new_space.to_space().top());

        let bytes_copied = heap.semi_space_copied_object_size();
        let bytes_promoted = heap.promoted_objects_size();
        let duration = timer.elapsed();
        heap.stats().record_pass(duration, bytes_copied, bytes_promoted);

        if config.verbose {
            let mut counts = SurvivalCounts::default();
            for summary in &summaries {
                counts.merge(&summary.survival);
            }
            log_event(ScavengeEvent::SurvivalStats { pass, counts });
        }

        log::debug!(
            "scavenge {}: done in {:?}, copied {} bytes, promoted {} bytes",
            pass,
            duration,
            bytes_copied,
            bytes_promoted
        );
        log_event(ScavengeEvent::PassEnd {
            pass,
            duration_ms: duration.as_secs_f64() * 1000.0,
            bytes_copied,
            bytes_promoted,
            weak_handles_cleared,
        });

        ScavengeOutcome {
            pass,
            tasks,
            bytes_copied,
            bytes_promoted,
            duration,
            remembered_set_pages,
            weak_handles_cleared,
        }
    }

    /// Task 0 runs on the calling thread, the rest on scoped threads
    fn run_tasks(
        scavengers: &mut [Scavenger<'_>],
        barrier: &Barrier,
        work: &SharedWork,
    ) -> Vec<Duration> {
        // Every task is registered before any can reach the barrier
        for _ in 0..scavengers.len() {
            barrier.start();
        }

        let Some((main, helpers)) = scavengers.split_first_mut() else {
            return Vec::new();
        };

        thread::scope(|scope| {
            let handles: Vec<_> = helpers
                .iter_mut()
                .map(|scavenger| {
                    let id = scavenger.task_id();
                    thread::Builder::new()
                        .name(format!("nursery-scavenger-{}", id))
                        .spawn_scoped(scope, move || {
                            Self::run_task(scavenger, barrier, work)
                        })
                        .unwrap_or_else(|e| {
                            barrier.abort();
                            panic!("Failed to spawn scavenger task {}: {}", id, e)
                        })
                })
                .collect();

            let mut durations = vec![Self::run_task(main, barrier, work)];
            for handle in handles {
                match handle.join() {
                    Ok(duration) => durations.push(duration),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            durations
        })
    }

    fn run_task(
        scavenger: &mut Scavenger<'_>,
        barrier: &Barrier,
        work: &SharedWork,
    ) -> Duration {
        let _guard = AbortOnPanic(barrier);
        let timer = ScavengeTimer::start();
        let heap = scavenger.heap;

        loop {
            let chunk = work.claim_roots();
            if chunk.is_empty() {
                break;
            }
            let mut visitor = RootScavengeVisitor::new(scavenger);
            for &slot in chunk {
                visitor.visit_root_pointer(Root::Handles, slot);
            }
        }

        while let Some(page) = work.claim_page() {
            heap.remembered_set()
                .iterate(page, |slot| scavenger.check_and_scavenge_object(slot));
        }

        loop {
            scavenger.process(Some(barrier));
            if barrier.wait() {
                break;
            }
        }
        scavenger.process(None);

        timer.elapsed()
    }

    /// Update weak handles to moved objects and clear the ones whose target
    /// died
    fn process_weak_handles(heap: &Heap) -> usize {
        let mut cleared = 0;
        for slot in heap.handles().weak_slots() {
            let Some(object) = heap.load_slot(slot).to_heap_object() else {
                continue;
            };
            if !heap.in_from_space(object) {
                continue;
            }
            match heap.forwarding_address(object) {
                Some(target) => heap.store_slot(slot, Value::from(target)),
                None => {
                    heap.store_slot(slot, Value::UNDEFINED);
                    cleared += 1;
                }
            }
        }
        cleared
    }
}
