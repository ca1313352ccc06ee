//! Root visiting
//!
//! Roots are slots outside any object. The scavenger rewrites them in place
//! the same way it rewrites object fields.

use crate::object::Slot;
use std::fmt;

/// Root category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    /// Strong handles
    Handles,
    /// Weak handles, visited after the pass
    WeakHandles,
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Handles => write!(f, "handles"),
            Root::WeakHandles => write!(f, "weak handles"),
        }
    }
}

/// Receives root slots
pub trait RootVisitor {
    fn visit_root_pointer(&mut self, root: Root, slot: Slot);

    /// Visit the contiguous roots `[start, end)`
    fn visit_root_pointers(&mut self, root: Root, start: Slot, end: Slot) {
        for slot in Slot::range(start, end) {
            self.visit_root_pointer(root, slot);
        }
    }
}

/// Gathers root slots so a pass can split them between tasks
impl RootVisitor for Vec<Slot> {
    fn visit_root_pointer(&mut self, _root: Root, slot: Slot) {
        self.push(slot);
    }
}
