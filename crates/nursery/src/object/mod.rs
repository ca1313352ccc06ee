//! Object Module - Heap object model
//!
//! Tagged values, maps, field layouts and body descriptors of the objects
//! the scavenger moves.

pub mod body;
pub mod layout;
pub mod map;
pub mod value;

pub use body::{iterate_body, iterate_body_weak, size_from_map, ObjectVisitor};
pub use map::{Map, MapId, MapTable, MapWord, VisitorId};
pub use value::{Address, HeapObject, Slot, Value};
