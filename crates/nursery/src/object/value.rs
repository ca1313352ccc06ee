//! Tagged values, object references and slots
//!
//! Word encoding:
//! ```text
//! ┌──────────────────────────────────────┬───┐
//! │  object address (word aligned)       │ 1 │   heap object pointer
//! ├──────────────────────────────────────┼───┤
//! │  small integer                       │ 0 │   Smi
//! └──────────────────────────────────────┴───┘
//! ```

use crate::util::constants::WORD_SIZE;
use std::fmt;

/// Byte address inside the heap arena
pub type Address = usize;

/// Low bit set on every heap object pointer
pub const HEAP_OBJECT_TAG: usize = 1;

/// A tagged word as stored in object fields and root slots
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value(usize);

impl Value {
    /// The undefined value; also the cleared state of a weak handle
    pub const UNDEFINED: Value = Value(0);

    /// Reinterpret a raw word
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Value(raw)
    }

    /// Encode a small integer
    #[inline]
    pub const fn from_smi(value: usize) -> Self {
        Value(value << 1)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_heap_object(self) -> bool {
        self.0 & HEAP_OBJECT_TAG != 0
    }

    #[inline]
    pub const fn is_smi(self) -> bool {
        !self.is_heap_object()
    }

    /// Decode the small integer payload
    #[inline]
    pub fn to_smi(self) -> Option<usize> {
        self.is_smi().then_some(self.0 >> 1)
    }

    /// Decode the object reference
    #[inline]
    pub fn to_heap_object(self) -> Option<HeapObject> {
        self.is_heap_object()
            .then_some(HeapObject(self.0 & !HEAP_OBJECT_TAG))
    }
}

impl From<HeapObject> for Value {
    #[inline]
    fn from(object: HeapObject) -> Self {
        Value(object.0 | HEAP_OBJECT_TAG)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_heap_object() {
            Some(object) => write!(f, "{:?}", object),
            None => write!(f, "Smi({})", self.0 >> 1),
        }
    }
}

/// Untagged reference to a heap object (the address of its map word)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapObject(Address);

impl HeapObject {
    #[inline]
    pub const fn from_address(address: Address) -> Self {
        HeapObject(address)
    }

    #[inline]
    pub const fn address(self) -> Address {
        self.0
    }

    /// Slot of the word at byte `offset` from the object start
    #[inline]
    pub const fn slot_at(self, offset: usize) -> Slot {
        Slot(self.0 + offset)
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapObject({:#x})", self.0)
    }
}

/// Address of one tagged word: an object field or a root
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(Address);

impl Slot {
    #[inline]
    pub const fn new(address: Address) -> Self {
        Slot(address)
    }

    #[inline]
    pub const fn address(self) -> Address {
        self.0
    }

    /// The slot `words` words further on
    #[inline]
    pub const fn offset(self, words: usize) -> Slot {
        Slot(self.0 + words * WORD_SIZE)
    }

    /// Every slot in `[start, end)`
    pub fn range(start: Slot, end: Slot) -> impl Iterator<Item = Slot> {
        (start.0..end.0).step_by(WORD_SIZE).map(Slot)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smi_encoding() {
        let value = Value::from_smi(21);
        assert!(value.is_smi());
        assert_eq!(value.to_smi(), Some(21));
        assert_eq!(value.to_heap_object(), None);
        assert_eq!(Value::UNDEFINED.to_smi(), Some(0));
    }

    #[test]
    fn test_heap_object_tagging() {
        let object = HeapObject::from_address(0x4000);
        let value = Value::from(object);
        assert_eq!(value.raw(), 0x4001);
        assert!(value.is_heap_object());
        assert_eq!(value.to_heap_object(), Some(object));
        assert_eq!(value.to_smi(), None);
    }

    #[test]
    fn test_slot_range() {
        let start = Slot::new(0x4008);
        let end = start.offset(3);
        let slots: Vec<_> = Slot::range(start, end).collect();
        assert_eq!(
            slots,
            vec![Slot::new(0x4008), Slot::new(0x4010), Slot::new(0x4018)]
        );
        assert_eq!(Slot::range(end, end).count(), 0);
    }
}
