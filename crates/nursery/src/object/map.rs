//! Maps and map words
//!
//! Every object starts with a map word. While the object is live the word
//! names its [`Map`]; once the scavenger has moved the object the same word
//! holds the forwarding address of the new copy:
//!
//! ```text
//! ┌──────────────────────────────────────┬───┐
//! │  map id                              │ 1 │   live object
//! ├──────────────────────────────────────┼───┤
//! │  forwarding address (word aligned)   │ 0 │   forwarded object
//! └──────────────────────────────────────┴───┘
//! ```
//!
//! Both states fit in one word, so installing a forwarding address is a
//! single compare-and-swap against the map word that was read.

use super::layout;
use super::value::{Address, HeapObject};
use crate::error::{NurseryError, Result};
use crate::util::constants::WORD_SIZE;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;

/// Object kind, selects the body layout and the evacuation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VisitorId {
    Filler,
    FreeSpace,
    Struct,
    FixedArray,
    ByteArray,
    SeqString,
    ThinString,
    ConsString,
    JsFunction,
    AllocationSite,
    AllocationMemento,
}

impl VisitorId {
    /// Kinds whose bodies hold no tagged pointers
    pub fn contains_only_data(self) -> bool {
        matches!(
            self,
            VisitorId::ByteArray
                | VisitorId::SeqString
                | VisitorId::Filler
                | VisitorId::FreeSpace
        )
    }
}

/// Index into the [`MapTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(pub u32);

pub const ONE_POINTER_FILLER_MAP: MapId = MapId(0);
pub const FREE_SPACE_MAP: MapId = MapId(1);
pub const FIXED_ARRAY_MAP: MapId = MapId(2);
pub const BYTE_ARRAY_MAP: MapId = MapId(3);
pub const SEQ_STRING_MAP: MapId = MapId(4);
pub const THIN_STRING_MAP: MapId = MapId(5);
pub const CONS_STRING_MAP: MapId = MapId(6);
pub const JS_FUNCTION_MAP: MapId = MapId(7);
pub const ALLOCATION_SITE_MAP: MapId = MapId(8);
pub const ALLOCATION_MEMENTO_MAP: MapId = MapId(9);

/// Shape descriptor shared by all objects of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Map {
    visitor_id: VisitorId,
    /// `None` for kinds whose size is derived from a length word
    instance_size: Option<usize>,
    /// Tagged fields directly after the map word (structs only)
    pointer_fields: usize,
    tracks_allocation_sites: bool,
}

impl Map {
    const fn fixed(visitor_id: VisitorId, instance_size: usize) -> Self {
        Map {
            visitor_id,
            instance_size: Some(instance_size),
            pointer_fields: 0,
            tracks_allocation_sites: false,
        }
    }

    const fn variable(visitor_id: VisitorId) -> Self {
        Map {
            visitor_id,
            instance_size: None,
            pointer_fields: 0,
            tracks_allocation_sites: false,
        }
    }

    /// Struct with `pointer_fields` tagged fields then `data_fields` raw words
    pub fn new_struct(
        pointer_fields: usize,
        data_fields: usize,
        tracks_allocation_sites: bool,
    ) -> Self {
        Map {
            visitor_id: VisitorId::Struct,
            instance_size: Some(layout::HEADER_SIZE + (pointer_fields + data_fields) * WORD_SIZE),
            pointer_fields,
            tracks_allocation_sites,
        }
    }

    #[inline]
    pub fn visitor_id(&self) -> VisitorId {
        self.visitor_id
    }

    #[inline]
    pub fn instance_size(&self) -> Option<usize> {
        self.instance_size
    }

    #[inline]
    pub fn pointer_fields(&self) -> usize {
        self.pointer_fields
    }

    /// Whether an allocation memento may trail instances of this map
    #[inline]
    pub fn tracks_allocation_sites(&self) -> bool {
        self.tracks_allocation_sites
    }

    #[inline]
    pub fn contains_only_data(&self) -> bool {
        self.visitor_id.contains_only_data()
            || (self.visitor_id == VisitorId::Struct && self.pointer_fields == 0)
    }
}

/// The first word of an object: a map id or a forwarding address
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MapWord(usize);

impl MapWord {
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        MapWord(raw)
    }

    #[inline]
    pub const fn from_map(map: MapId) -> Self {
        MapWord(((map.0 as usize) << 1) | 1)
    }

    #[inline]
    pub const fn from_forwarding_address(target: HeapObject) -> Self {
        MapWord(target.address())
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_forwarding_address(self) -> bool {
        self.0 & 1 == 0
    }

    #[inline]
    pub fn to_map(self) -> MapId {
        debug_assert!(!self.is_forwarding_address());
        MapId((self.0 >> 1) as u32)
    }

    #[inline]
    pub fn to_forwarding_address(self) -> HeapObject {
        debug_assert!(self.is_forwarding_address());
        HeapObject::from_address(self.0 as Address)
    }
}

impl fmt::Debug for MapWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_forwarding_address() {
            write!(f, "MapWord(forward -> {:#x})", self.0)
        } else {
            write!(f, "MapWord({:?})", self.to_map())
        }
    }
}

/// Registry of all maps, builtin ones first
pub struct MapTable {
    maps: RwLock<Vec<Map>>,
}

impl MapTable {
    pub fn new() -> Self {
        let builtins = vec![
            Map::fixed(VisitorId::Filler, WORD_SIZE),
            Map::variable(VisitorId::FreeSpace),
            Map::variable(VisitorId::FixedArray),
            Map::variable(VisitorId::ByteArray),
            Map::variable(VisitorId::SeqString),
            Map::fixed(VisitorId::ThinString, layout::THIN_STRING_SIZE),
            Map::fixed(VisitorId::ConsString, layout::CONS_STRING_SIZE),
            Map::fixed(VisitorId::JsFunction, layout::FUNCTION_SIZE),
            Map::fixed(VisitorId::AllocationSite, layout::ALLOCATION_SITE_SIZE),
            Map::fixed(VisitorId::AllocationMemento, layout::ALLOCATION_MEMENTO_SIZE),
        ];
        debug_assert_eq!(builtins.len(), ALLOCATION_MEMENTO_MAP.0 as usize + 1);
        Self {
            maps: RwLock::new(builtins),
        }
    }

    /// Register a struct map
    pub fn register_struct(
        &self,
        pointer_fields: usize,
        data_fields: usize,
        tracks_allocation_sites: bool,
    ) -> Result<MapId> {
        if pointer_fields + data_fields == 0 {
            return Err(NurseryError::InvalidArgument(
                "struct map needs at least one field".to_string(),
            ));
        }
        let mut maps = self.maps.write();
        let id = MapId(maps.len() as u32);
        maps.push(Map::new_struct(
            pointer_fields,
            data_fields,
            tracks_allocation_sites,
        ));
        Ok(id)
    }

    /// Look up a map. Map ids come from map words, so an unknown id is a
    /// corrupted heap.
    #[inline]
    pub fn get(&self, id: MapId) -> Map {
        let maps = self.maps.read();
        match maps.get(id.0 as usize) {
            Some(map) => *map,
            None => panic!("unknown map id {:?}: heap corrupted", id),
        }
    }

    pub fn try_get(&self, id: MapId) -> Option<Map> {
        self.maps.read().get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MapTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_word_states_disjoint() {
        let live = MapWord::from_map(CONS_STRING_MAP);
        assert!(!live.is_forwarding_address());
        assert_eq!(live.to_map(), CONS_STRING_MAP);

        let forwarded = MapWord::from_forwarding_address(HeapObject::from_address(0x8010));
        assert!(forwarded.is_forwarding_address());
        assert_eq!(forwarded.to_forwarding_address().address(), 0x8010);
        assert_ne!(live, forwarded);
    }

    #[test]
    fn test_builtin_maps() {
        let table = MapTable::new();
        assert_eq!(table.get(THIN_STRING_MAP).visitor_id(), VisitorId::ThinString);
        assert_eq!(
            table.get(JS_FUNCTION_MAP).instance_size(),
            Some(layout::FUNCTION_SIZE)
        );
        assert!(table.get(BYTE_ARRAY_MAP).contains_only_data());
        assert!(!table.get(FIXED_ARRAY_MAP).contains_only_data());
    }

    #[test]
    fn test_register_struct() {
        let table = MapTable::new();
        let id = table.register_struct(2, 1, true).unwrap();
        let map = table.get(id);
        assert_eq!(map.visitor_id(), VisitorId::Struct);
        assert_eq!(map.instance_size(), Some(4 * WORD_SIZE));
        assert_eq!(map.pointer_fields(), 2);
        assert!(map.tracks_allocation_sites());
        assert!(table.try_get(MapId(id.0 + 1)).is_none());
    }

    #[test]
    fn test_register_empty_struct_rejected() {
        let table = MapTable::new();
        assert!(matches!(
            table.register_struct(0, 0, false),
            Err(NurseryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_data_only_struct() {
        let table = MapTable::new();
        let id = table.register_struct(0, 3, false).unwrap();
        assert!(table.get(id).contains_only_data());
    }
}
