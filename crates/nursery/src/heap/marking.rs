//! Marking state - the mark-compact collaborator
//!
//! A scavenge may run while the full collector is in the middle of
//! incremental marking. The scavenger then has to keep the collector's view
//! consistent:
//!
//! - colour moves with the object (`transfer_color`),
//! - slots of black promoted objects that point at evacuation candidates are
//!   recorded for the compactor (`record_slot`),
//! - string indirections are not collapsed.
//!
//! The full collector itself is out of scope; this state only carries what
//! the scavenger reads and writes.

use super::bitmap::Bitmap;
use crate::object::{Address, HeapObject, Slot};
use crate::util::constants::{PAGE_SIZE, WORD_SIZE};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Tri-colour marking state of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Grey,
    Black,
}

/// A slot recorded for the compactor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedSlot {
    pub host: HeapObject,
    pub slot: Slot,
    pub target: HeapObject,
}

/// Marking bitmaps, phase flags and the recorded-slot buffer
pub struct MarkingState {
    marking: AtomicBool,
    compacting: AtomicBool,
    black: Bitmap,
    grey: Bitmap,
    evacuation_candidates: Bitmap,
    recorded_slots: Mutex<Vec<RecordedSlot>>,
}

impl MarkingState {
    /// Cover an arena of `arena_size` bytes
    pub fn new(arena_size: usize) -> Self {
        Self {
            marking: AtomicBool::new(false),
            compacting: AtomicBool::new(false),
            black: Bitmap::new(arena_size / WORD_SIZE),
            grey: Bitmap::new(arena_size / WORD_SIZE),
            evacuation_candidates: Bitmap::new(arena_size / PAGE_SIZE),
            recorded_slots: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    fn bit(object: HeapObject) -> usize {
        object.address() / WORD_SIZE
    }

    /// Enter incremental marking; `compacting` selects evacuation
    pub fn start_marking(&self, compacting: bool) {
        self.compacting.store(compacting, Ordering::Release);
        self.marking.store(true, Ordering::Release);
    }

    /// Leave marking and drop all colours, candidates and recorded slots
    pub fn stop_marking(&self) {
        self.marking.store(false, Ordering::Release);
        self.compacting.store(false, Ordering::Release);
        self.black.clear_all();
        self.grey.clear_all();
        self.evacuation_candidates.clear_all();
        self.recorded_slots.lock().clear();
    }

    #[inline]
    pub fn is_marking(&self) -> bool {
        self.marking.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_compacting(&self) -> bool {
        self.compacting.load(Ordering::Acquire)
    }

    pub fn color(&self, object: HeapObject) -> Color {
        let bit = Self::bit(object);
        if self.black.get(bit) {
            Color::Black
        } else if self.grey.get(bit) {
            Color::Grey
        } else {
            Color::White
        }
    }

    #[inline]
    pub fn is_black(&self, object: HeapObject) -> bool {
        self.black.get(Self::bit(object))
    }

    pub fn mark_grey(&self, object: HeapObject) -> bool {
        self.grey.set(Self::bit(object))
    }

    pub fn mark_black(&self, object: HeapObject) -> bool {
        let bit = Self::bit(object);
        self.grey.clear(bit);
        self.black.set(bit)
    }

    /// Give `to` the colour of `from`
    pub fn transfer_color(&self, from: HeapObject, to: HeapObject) {
        match self.color(from) {
            Color::Black => {
                self.black.set(Self::bit(to));
            }
            Color::Grey => {
                self.grey.set(Self::bit(to));
            }
            Color::White => {}
        }
    }

    /// Mark the page containing `address` for evacuation
    pub fn add_evacuation_candidate(&self, address: Address) {
        self.evacuation_candidates.set(address / PAGE_SIZE);
    }

    #[inline]
    pub fn is_on_evacuation_candidate(&self, object: HeapObject) -> bool {
        self.evacuation_candidates.get(object.address() / PAGE_SIZE)
    }

    /// Record a slot whose target will move during compaction
    pub fn record_slot(&self, host: HeapObject, slot: Slot, target: HeapObject) {
        self.recorded_slots
            .lock()
            .push(RecordedSlot { host, slot, target });
    }

    /// Copy of the recorded-slot buffer
    pub fn recorded_slots(&self) -> Vec<RecordedSlot> {
        self.recorded_slots.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(address: Address) -> HeapObject {
        HeapObject::from_address(address)
    }

    #[test]
    fn test_colors() {
        let state = MarkingState::new(8 * PAGE_SIZE);
        let a = object(PAGE_SIZE);
        assert_eq!(state.color(a), Color::White);
        state.mark_grey(a);
        assert_eq!(state.color(a), Color::Grey);
        state.mark_black(a);
        assert_eq!(state.color(a), Color::Black);
        assert!(state.is_black(a));
    }

    #[test]
    fn test_transfer_color() {
        let state = MarkingState::new(8 * PAGE_SIZE);
        let (black, grey, white) = (object(PAGE_SIZE), object(PAGE_SIZE + 8), object(PAGE_SIZE + 16));
        state.mark_black(black);
        state.mark_grey(grey);

        let targets = [object(2 * PAGE_SIZE), object(2 * PAGE_SIZE + 8), object(2 * PAGE_SIZE + 16)];
        state.transfer_color(black, targets[0]);
        state.transfer_color(grey, targets[1]);
        state.transfer_color(white, targets[2]);

        assert_eq!(state.color(targets[0]), Color::Black);
        assert_eq!(state.color(targets[1]), Color::Grey);
        assert_eq!(state.color(targets[2]), Color::White);
    }

    #[test]
    fn test_phase_flags_and_reset() {
        let state = MarkingState::new(8 * PAGE_SIZE);
        assert!(!state.is_marking());

        state.start_marking(true);
        assert!(state.is_marking());
        assert!(state.is_compacting());

        state.add_evacuation_candidate(3 * PAGE_SIZE + 40);
        assert!(state.is_on_evacuation_candidate(object(3 * PAGE_SIZE)));
        assert!(!state.is_on_evacuation_candidate(object(4 * PAGE_SIZE)));
        state.record_slot(object(PAGE_SIZE), Slot::new(PAGE_SIZE + 8), object(3 * PAGE_SIZE));
        assert_eq!(state.recorded_slots().len(), 1);

        state.stop_marking();
        assert!(!state.is_marking());
        assert!(!state.is_on_evacuation_candidate(object(3 * PAGE_SIZE)));
        assert!(state.recorded_slots().is_empty());
    }
}
