//! Remembered set - old-to-new slots
//!
//! The write barrier records every old-space slot that receives a pointer
//! into the new space. A scavenge treats those slots as extra roots: each
//! old page with recorded slots becomes one work item, processed by exactly
//! one task, whose callback decides per slot whether it stays recorded.
//!
//! One bit per word of old space, grouped per 16KB page.

use super::bitmap::Bitmap;
use crate::object::{Address, Slot};
use crate::util::constants::{PAGE_SIZE, WORDS_PER_PAGE, WORD_SIZE};

/// Result of a remembered-set slot callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCallbackResult {
    /// Slot still points into the new space
    Keep,
    /// Slot no longer holds an old-to-new pointer
    Remove,
}

/// Old-to-new slot sets for every old-space page
pub struct RememberedSet {
    base: Address,
    pages: Vec<Bitmap>,
}

impl RememberedSet {
    /// Cover `[base, base + size)`; `base` is page aligned
    pub fn new(base: Address, size: usize) -> Self {
        let pages = (0..size / PAGE_SIZE)
            .map(|_| Bitmap::new(WORDS_PER_PAGE))
            .collect();
        Self { base, pages }
    }

    #[inline]
    fn locate(&self, slot: Slot) -> (usize, usize) {
        let offset = slot.address() - self.base;
        (offset / PAGE_SIZE, (offset % PAGE_SIZE) / WORD_SIZE)
    }

    /// Page index of a slot
    pub fn page_of(&self, slot: Slot) -> usize {
        self.locate(slot).0
    }

    /// Record an old-to-new slot
    pub fn insert(&self, slot: Slot) {
        let (page, bit) = self.locate(slot);
        self.pages[page].set(bit);
    }

    pub fn remove(&self, slot: Slot) {
        let (page, bit) = self.locate(slot);
        self.pages[page].clear(bit);
    }

    pub fn contains(&self, slot: Slot) -> bool {
        let (page, bit) = self.locate(slot);
        self.pages[page].get(bit)
    }

    /// Pages with at least one recorded slot
    pub fn pages_with_slots(&self) -> Vec<usize> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, slots)| !slots.is_empty())
            .map(|(page, _)| page)
            .collect()
    }

    /// Run `callback` on every slot of `page`, dropping the ones it removes
    ///
    /// Returns the number of slots still recorded on the page.
    pub fn iterate<F>(&self, page: usize, mut callback: F) -> usize
    where
        F: FnMut(Slot) -> SlotCallbackResult,
    {
        let page_start = self.base + page * PAGE_SIZE;
        let slots = &self.pages[page];
        let mut kept = 0;
        for bit in slots.iter_set() {
            let slot = Slot::new(page_start + bit * WORD_SIZE);
            match callback(slot) {
                SlotCallbackResult::Keep => kept += 1,
                SlotCallbackResult::Remove => {
                    slots.clear(bit);
                }
            }
        }
        kept
    }

    /// Total recorded slots
    pub fn len(&self) -> usize {
        self.pages.iter().map(Bitmap::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Bitmap::is_empty)
    }

    pub fn clear(&self) {
        for page in &self.pages {
            page.clear_all();
        }
    }
}
