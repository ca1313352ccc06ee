//! Handle space - the root set
//!
//! Roots live in a dedicated region of the arena, one word per handle, so a
//! root is just another [`Slot`] the scavenger can rewrite in place. Strong
//! handles are scavenged as roots; weak handles are updated after the pass
//! or cleared if their target died.

use super::bitmap::Bitmap;
use crate::error::{NurseryError, Result};
use crate::object::{Address, Slot};
use crate::util::constants::WORD_SIZE;
use parking_lot::Mutex;

/// A root handle: index into the handle space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity table of root slots
pub struct HandleSpace {
    start: Address,
    capacity: usize,
    in_use: Bitmap,
    weak: Bitmap,
    free: Mutex<Vec<usize>>,
}

impl HandleSpace {
    pub fn new(start: Address, capacity: usize) -> Self {
        Self {
            start,
            capacity,
            in_use: Bitmap::new(capacity),
            weak: Bitmap::new(capacity),
            // Lowest indices handed out first
            free: Mutex::new((0..capacity).rev().collect()),
        }
    }

    /// Reserve a handle; the caller stores the initial value
    pub fn acquire(&self, weak: bool) -> Result<Handle> {
        let index = self
            .free
            .lock()
            .pop()
            .ok_or(NurseryError::HandleExhausted {
                capacity: self.capacity,
            })?;
        if weak {
            self.weak.set(index);
        }
        self.in_use.set(index);
        Ok(Handle(index))
    }

    /// Return a handle to the free list
    pub fn release(&self, handle: Handle) -> Result<()> {
        if !self.is_live(handle) {
            log::warn!("release of dead handle {}", handle.0);
            return Err(NurseryError::InvalidArgument(format!(
                "handle {} is not in use",
                handle.0
            )));
        }
        self.in_use.clear(handle.0);
        self.weak.clear(handle.0);
        self.free.lock().push(handle.0);
        Ok(())
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        handle.0 < self.capacity && self.in_use.get(handle.0)
    }

    pub fn is_weak(&self, handle: Handle) -> bool {
        self.weak.get(handle.0)
    }

    /// The root slot backing `handle`
    #[inline]
    pub fn slot(&self, handle: Handle) -> Slot {
        Slot::new(self.start + handle.0 * WORD_SIZE)
    }

    /// Slots of the live strong handles
    pub fn strong_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.in_use
            .iter_set()
            .filter(|index| !self.weak.get(*index))
            .map(|index| Slot::new(self.start + index * WORD_SIZE))
    }

    /// Slots of the live weak handles
    pub fn weak_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.weak
            .iter_set()
            .filter(|index| self.in_use.get(*index))
            .map(|index| Slot::new(self.start + index * WORD_SIZE))
    }

    pub fn live_count(&self) -> usize {
        self.in_use.count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
