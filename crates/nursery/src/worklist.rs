//! Worklist - Segmented Concurrent Work Queue
//!
//! Workers push and pop entries on private segments and only touch shared
//! state when a whole segment changes hands.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    GLOBAL SEGMENT POOL                   │
//! │          (crossbeam Injector of full segments)           │
//! └─────────────────────────────────────────────────────────┘
//!              ▲ publish full          │ steal whole
//!              │                       ▼
//! ┌────────────────────────┐   ┌────────────────────────┐
//! │ Local (worker 1)       │   │ Local (worker N)       │
//! │  push segment  [....]  │   │  push segment  [....]  │
//! │  pop segment   [..]    │   │  pop segment   [..]    │
//! └────────────────────────┘   └────────────────────────┘
//! ```
//!
//! A `None` from [`Local::pop`] only means this worker sees no work right
//! now; other workers may still hold private segments. Detecting global
//! exhaustion is the job of the scavenger's barrier.

use crate::util::constants::SEGMENT_SIZE;
use crossbeam_deque::{Injector, Steal};
use std::mem;

/// Shared pool of full segments
pub struct Worklist<T, const N: usize = SEGMENT_SIZE> {
    pool: Injector<Vec<T>>,
}

impl<T: Send, const N: usize> Worklist<T, N> {
    pub fn new() -> Self {
        Self {
            pool: Injector::new(),
        }
    }

    /// Create a worker view onto this worklist
    pub fn local(&self) -> Local<'_, T, N> {
        Local {
            worklist: self,
            push_segment: Vec::with_capacity(N),
            pop_segment: Vec::new(),
        }
    }

    /// Publish a segment; empty segments are dropped
    fn publish(&self, segment: Vec<T>) {
        if !segment.is_empty() {
            self.pool.push(segment);
        }
    }

    /// Take one segment from the pool
    fn steal(&self) -> Option<Vec<T>> {
        loop {
            match self.pool.steal() {
                Steal::Success(segment) => return Some(segment),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    pub fn is_global_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Number of segments in the pool
    pub fn global_pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Drop every pooled segment
    pub fn clear(&self) {
        while self.steal().is_some() {}
    }

    /// Segment capacity
    pub const fn segment_size() -> usize {
        N
    }
}

impl<T: Send, const N: usize> Default for Worklist<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker view: a push segment and a pop segment
pub struct Local<'w, T: Send, const N: usize = SEGMENT_SIZE> {
    worklist: &'w Worklist<T, N>,
    push_segment: Vec<T>,
    pop_segment: Vec<T>,
}

impl<'w, T: Send, const N: usize> Local<'w, T, N> {
    /// Push an entry, publishing the push segment once it is full
    pub fn push(&mut self, item: T) {
        self.push_segment.push(item);
        if self.push_segment.len() >= N {
            let full = mem::replace(&mut self.push_segment, Vec::with_capacity(N));
            self.worklist.publish(full);
        }
    }

    /// Pop an entry: pop segment, then own push segment, then the pool
    pub fn pop(&mut self) -> Option<T> {
        if let Some(item) = self.pop_segment.pop() {
            return Some(item);
        }
        if !self.push_segment.is_empty() {
            mem::swap(&mut self.push_segment, &mut self.pop_segment);
            return self.pop_segment.pop();
        }
        self.pop_segment = self.worklist.steal()?;
        self.pop_segment.pop()
    }

    /// Fill level of the outgoing segment
    #[inline]
    pub fn local_push_segment_size(&self) -> usize {
        self.push_segment.len()
    }

    pub fn is_local_empty(&self) -> bool {
        self.push_segment.is_empty() && self.pop_segment.is_empty()
    }

    pub fn is_global_pool_empty(&self) -> bool {
        self.worklist.is_global_empty()
    }

    /// Publish both private segments
    pub fn flush_to_global(&mut self) {
        let push = mem::take(&mut self.push_segment);
        let pop = mem::take(&mut self.pop_segment);
        self.worklist.publish(push);
        self.worklist.publish(pop);
    }
}

impl<'w, T: Send, const N: usize> Drop for Local<'w, T, N> {
    fn drop(&mut self) {
        self.flush_to_global();
    }
}
