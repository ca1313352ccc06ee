//! Heap Module - Arena, spaces and mutator services
//!
//! Arena layout (page aligned):
//! ```text
//! ┌────────┬──────────────┬──────────────┬──────────────┬──────────────────┐
//! │ guard  │ root handles │ semispace A  │ semispace B  │ old space        │
//! └────────┴──────────────┴──────────────┴──────────────┴──────────────────┘
//!                          └──── new space (to/from flip) ───┘
//! ```
//!
//! The heap owns everything a scavenge reads or writes besides its own
//! worklists: the spaces, the map table, the handle (root) space, the
//! old-to-new remembered set, the marking collaborator and the global
//! counters. Mutators use it to allocate and link objects; every field write
//! goes through the write barrier so that old-to-new pointers are recorded.

pub mod bitmap;
pub mod handles;
pub mod local_allocator;
pub mod marking;
pub mod pretenuring;
pub mod remembered_set;
pub mod roots;
pub mod spaces;

pub use handles::{Handle, HandleSpace};
pub use local_allocator::LocalAllocator;
pub use marking::{Color, MarkingState, RecordedSlot};
pub use pretenuring::PretenuringFeedbackMap;
pub use remembered_set::{RememberedSet, SlotCallbackResult};
pub use roots::{Root, RootVisitor};
pub use spaces::{AllocationSpace, NewSpace, Space, SpaceId};

use crate::config::ScavengerConfig;
use crate::error::{NurseryError, Result};
use crate::memory::Memory;
use crate::object::layout::{self, byte_array_size, fixed_array_size};
use crate::object::map::{
    ALLOCATION_MEMENTO_MAP, ALLOCATION_SITE_MAP, BYTE_ARRAY_MAP, CONS_STRING_MAP,
    FIXED_ARRAY_MAP, FREE_SPACE_MAP, JS_FUNCTION_MAP, ONE_POINTER_FILLER_MAP, SEQ_STRING_MAP,
    THIN_STRING_MAP,
};
use crate::object::{
    iterate_body, size_from_map, Address, HeapObject, Map, MapId, MapTable, MapWord,
    ObjectVisitor, Slot, Value, VisitorId,
};
use crate::scavenger::{ScavengeJob, ScavengeOutcome};
use crate::stats::ScavengeStats;
use crate::util::align_up;
use crate::util::constants::{PAGE_SIZE, WORD_SIZE};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// The young-generation heap
pub struct Heap {
    config: ScavengerConfig,
    memory: Memory,
    maps: MapTable,
    handles: HandleSpace,
    new_space: NewSpace,
    old_space: Space,
    remembered_set: RememberedSet,
    marking: MarkingState,
    empty_string: HeapObject,
    global_pretenuring_feedback: Mutex<PretenuringFeedbackMap>,
    /// Serializes scavenges
    relocation_mutex: Mutex<()>,
    gc_count: AtomicU64,
    semi_space_copied_object_size: AtomicUsize,
    promoted_objects_size: AtomicUsize,
    stats: ScavengeStats,
}

impl Heap {
    /// Reserve the arena and lay out the spaces
    pub fn new(config: ScavengerConfig) -> Result<Self> {
        config.validate()?;

        let handles_start = PAGE_SIZE;
        let handles_size = align_up(config.max_handles * WORD_SIZE, PAGE_SIZE);
        let new_space_start = handles_start + handles_size;
        let old_space_start = new_space_start + 2 * config.semi_space_size;
        let arena_size = old_space_start + config.old_space_size;

        let memory = Memory::new(arena_size);
        let old_space = Space::new(old_space_start, arena_size);
        let empty_string = Self::allocate_empty_string(&memory, &old_space)?;

        log::debug!(
            "heap: arena {} bytes, semispace {} bytes at {:#x}, old space {} bytes at {:#x}",
            arena_size,
            config.semi_space_size,
            new_space_start,
            config.old_space_size,
            old_space_start
        );

        Ok(Self {
            memory,
            maps: MapTable::new(),
            handles: HandleSpace::new(handles_start, config.max_handles),
            new_space: NewSpace::new(new_space_start, config.semi_space_size),
            old_space,
            remembered_set: RememberedSet::new(old_space_start, config.old_space_size),
            marking: MarkingState::new(arena_size),
            empty_string,
            global_pretenuring_feedback: Mutex::new(PretenuringFeedbackMap::new()),
            relocation_mutex: Mutex::new(()),
            gc_count: AtomicU64::new(0),
            semi_space_copied_object_size: AtomicUsize::new(0),
            promoted_objects_size: AtomicUsize::new(0),
            stats: ScavengeStats::new(),
            config,
        })
    }

    fn allocate_empty_string(memory: &Memory, old_space: &Space) -> Result<HeapObject> {
        let address = old_space.allocate(byte_array_size(0))?;
        memory.store(address, MapWord::from_map(SEQ_STRING_MAP).raw(), Ordering::Relaxed);
        memory.store(
            address + layout::LENGTH_OFFSET,
            Value::from_smi(0).raw(),
            Ordering::Relaxed,
        );
        Ok(HeapObject::from_address(address))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ScavengerConfig {
        &self.config
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn maps(&self) -> &MapTable {
        &self.maps
    }

    pub fn new_space(&self) -> &NewSpace {
        &self.new_space
    }

    pub fn old_space(&self) -> &Space {
        &self.old_space
    }

    pub fn remembered_set(&self) -> &RememberedSet {
        &self.remembered_set
    }

    pub fn marking(&self) -> &MarkingState {
        &self.marking
    }

    pub fn stats(&self) -> &ScavengeStats {
        &self.stats
    }

    pub fn handles(&self) -> &HandleSpace {
        &self.handles
    }

    /// The canonical empty string; the right side of flattened cons strings
    pub fn empty_string(&self) -> HeapObject {
        self.empty_string
    }

    /// Completed scavenges
    pub fn gc_count(&self) -> u64 {
        self.gc_count.load(Ordering::Relaxed)
    }

    pub(crate) fn next_gc_count(&self) -> u64 {
        self.gc_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn relocation_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.relocation_mutex.lock()
    }

    /// Tasks the next scavenge will run
    pub fn number_of_scavenge_tasks(&self) -> usize {
        self.config
            .number_of_scavenge_tasks(self.new_space.capacity())
    }

    // ------------------------------------------------------------------
    // Spaces
    // ------------------------------------------------------------------

    #[inline]
    pub fn in_from_space(&self, object: HeapObject) -> bool {
        self.new_space.from_space().contains(object.address())
    }

    #[inline]
    pub fn in_to_space(&self, object: HeapObject) -> bool {
        self.new_space.to_space().contains(object.address())
    }

    #[inline]
    pub fn in_new_space(&self, object: HeapObject) -> bool {
        self.new_space.contains(object.address())
    }

    #[inline]
    pub fn in_old_space(&self, object: HeapObject) -> bool {
        self.old_space.contains(object.address())
    }

    /// Large objects and objects that already survived a pass leave the
    /// new space
    #[inline]
    pub fn should_be_promoted(&self, object: HeapObject, size: usize) -> bool {
        size > self.config.large_object_threshold
            || object.address() < self.new_space.age_mark()
    }

    fn space(&self, space: AllocationSpace) -> &Space {
        match space {
            AllocationSpace::NewSpace => self.new_space.to_space(),
            AllocationSpace::OldSpace => &self.old_space,
        }
    }

    fn space_by_id(&self, id: SpaceId) -> &Space {
        match id {
            SpaceId::FromSpace => self.new_space.from_space(),
            SpaceId::ToSpace => self.new_space.to_space(),
            SpaceId::OldSpace => &self.old_space,
        }
    }

    /// Bytes allocated in to-space
    pub fn new_space_used(&self) -> usize {
        self.new_space.to_space().allocated()
    }

    // ------------------------------------------------------------------
    // Object model
    // ------------------------------------------------------------------

    #[inline]
    pub fn map_word(&self, object: HeapObject) -> MapWord {
        MapWord::from_raw(self.memory.load(object.address(), Ordering::Relaxed))
    }

    /// Map word read that observes a published forwarding address together
    /// with the payload written before it
    #[inline]
    pub fn synchronized_map_word(&self, object: HeapObject) -> MapWord {
        MapWord::from_raw(self.memory.load(object.address(), Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_map_word(&self, object: HeapObject, word: MapWord, order: Ordering) {
        self.memory.store(object.address(), word.raw(), order);
    }

    /// Map id of a live (not forwarded) object
    pub fn map_id_of(&self, object: HeapObject) -> MapId {
        self.map_word(object).to_map()
    }

    pub fn map_of(&self, object: HeapObject) -> Map {
        self.maps.get(self.map_id_of(object))
    }

    pub fn visitor_id(&self, object: HeapObject) -> VisitorId {
        self.map_of(object).visitor_id()
    }

    pub fn size_of(&self, object: HeapObject) -> usize {
        let map = self.map_of(object);
        size_from_map(&self.memory, &map, object)
    }

    /// Where a forwarded object went
    pub fn forwarding_address(&self, object: HeapObject) -> Option<HeapObject> {
        let word = self.synchronized_map_word(object);
        word.is_forwarding_address()
            .then(|| word.to_forwarding_address())
    }

    #[inline]
    pub fn load_slot(&self, slot: Slot) -> Value {
        Value::from_raw(self.memory.load(slot.address(), Ordering::Relaxed))
    }

    #[inline]
    pub fn store_slot(&self, slot: Slot, value: Value) {
        self.memory.store(slot.address(), value.raw(), Ordering::Relaxed);
    }

    /// Validate `object` as a live object reference from outside the crate
    fn check_object(&self, object: HeapObject) -> Result<Map> {
        self.memory.check(object.address())?;
        let word = self.map_word(object);
        if word.is_forwarding_address() {
            return Err(NurseryError::InvalidAddress {
                address: object.address(),
            });
        }
        self.maps.try_get(word.to_map()).ok_or(NurseryError::InvalidAddress {
            address: object.address(),
        })
    }

    /// Slot of field `index`, counting words after the map word
    fn field_slot(&self, object: HeapObject, index: usize) -> Result<Slot> {
        let map = self.check_object(object)?;
        let size = size_from_map(&self.memory, &map, object);
        let fields = size / WORD_SIZE - 1;
        if index >= fields {
            return Err(NurseryError::InvalidArgument(format!(
                "field {} out of range for {:?} with {} fields",
                index,
                map.visitor_id(),
                fields
            )));
        }
        Ok(object.slot_at(layout::HEADER_SIZE + index * WORD_SIZE))
    }

    pub fn read_field(&self, object: HeapObject, index: usize) -> Result<Value> {
        Ok(self.load_slot(self.field_slot(object, index)?))
    }

    /// Store into field `index` of `host` through the write barrier
    pub fn write_field(&self, host: HeapObject, index: usize, value: Value) -> Result<()> {
        let slot = self.field_slot(host, index)?;
        self.store_slot(slot, value);
        self.record_write(host, slot, value);
        Ok(())
    }

    /// Write barrier: remember old-to-new slots
    #[inline]
    pub fn record_write(&self, host: HeapObject, slot: Slot, value: Value) {
        if !self.in_old_space(host) {
            return;
        }
        if let Some(target) = value.to_heap_object() {
            if self.in_new_space(target) {
                self.remembered_set.insert(slot);
            }
        }
    }

    pub fn fixed_array_length(&self, array: HeapObject) -> Result<usize> {
        let map = self.check_object(array)?;
        if map.visitor_id() != VisitorId::FixedArray {
            return Err(NurseryError::InvalidArgument(format!(
                "{:?} is not a fixed array",
                array
            )));
        }
        Ok(self
            .load_slot(array.slot_at(layout::LENGTH_OFFSET))
            .to_smi()
            .unwrap_or(0))
    }

    pub fn fixed_array_get(&self, array: HeapObject, index: usize) -> Result<Value> {
        self.fixed_array_length(array)?;
        self.read_field(array, 1 + index)
    }

    pub fn fixed_array_set(&self, array: HeapObject, index: usize, value: Value) -> Result<()> {
        self.fixed_array_length(array)?;
        self.write_field(array, 1 + index, value)
    }

    /// Payload bytes of a byte array or sequential string
    pub fn byte_array_bytes(&self, object: HeapObject) -> Result<Vec<u8>> {
        let map = self.check_object(object)?;
        if !matches!(map.visitor_id(), VisitorId::ByteArray | VisitorId::SeqString) {
            return Err(NurseryError::InvalidArgument(format!(
                "{:?} holds no bytes",
                object
            )));
        }
        let length = self
            .load_slot(object.slot_at(layout::LENGTH_OFFSET))
            .to_smi()
            .unwrap_or(0);
        let words = self.memory.read_words(
            object.address() + layout::ARRAY_HEADER_SIZE,
            length.div_ceil(WORD_SIZE),
        );
        let mut bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        bytes.truncate(length);
        Ok(bytes)
    }

    /// Contents of a string, following thin and cons strings
    pub fn string_value(&self, string: HeapObject) -> Result<String> {
        let map = self.check_object(string)?;
        match map.visitor_id() {
            VisitorId::SeqString => {
                let bytes = self.byte_array_bytes(string)?;
                String::from_utf8(bytes)
                    .map_err(|e| NurseryError::Internal(format!("corrupted string: {}", e)))
            }
            VisitorId::ThinString => {
                let actual = self.read_field(string, 0)?;
                self.string_value(Self::expect_object(actual)?)
            }
            VisitorId::ConsString => {
                let first = Self::expect_object(self.read_field(string, 0)?)?;
                let second = Self::expect_object(self.read_field(string, 1)?)?;
                Ok(self.string_value(first)? + &self.string_value(second)?)
            }
            other => Err(NurseryError::InvalidArgument(format!(
                "{:?} is a {:?}, not a string",
                string, other
            ))),
        }
    }

    fn expect_object(value: Value) -> Result<HeapObject> {
        value.to_heap_object().ok_or_else(|| {
            NurseryError::InvalidArgument(format!("{:?} is not a heap object", value))
        })
    }

    /// Snapshot of every word of a live object
    pub fn object_words(&self, object: HeapObject) -> Result<Vec<usize>> {
        let map = self.check_object(object)?;
        let size = size_from_map(&self.memory, &map, object);
        Ok(self.memory.read_words(object.address(), size / WORD_SIZE))
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    pub fn register_struct_map(
        &self,
        pointer_fields: usize,
        data_fields: usize,
        tracks_allocation_sites: bool,
    ) -> Result<MapId> {
        self.maps
            .register_struct(pointer_fields, data_fields, tracks_allocation_sites)
    }

    /// Raw mutator allocation from the shared top of `space`
    /// Reserve `size` bytes in `space`
    ///
    /// Fails with `InvalidArgument` unless `size` is a non-zero multiple of
    /// the word size, and with `OutOfMemory` when the space is full.
    pub fn allocate_raw(&self, space: AllocationSpace, size: usize) -> Result<Address> {
        self.space(space).allocate(size)
    }

    pub fn allocate_young(&self, size: usize) -> Result<Address> {
        self.allocate_raw(AllocationSpace::NewSpace, size)
    }

    pub fn allocate_old(&self, size: usize) -> Result<Address> {
        self.allocate_raw(AllocationSpace::OldSpace, size)
    }

    /// Write map word and body, then run the write barrier over the body
    fn initialize_object(&self, address: Address, map: MapId, body: &[usize]) -> HeapObject {
        let object = HeapObject::from_address(address);
        for (i, word) in body.iter().enumerate() {
            self.memory
                .store(address + (i + 1) * WORD_SIZE, *word, Ordering::Relaxed);
        }
        self.memory
            .store(address, MapWord::from_map(map).raw(), Ordering::Release);
        if self.in_old_space(object) {
            let map = self.maps.get(map);
            let size = (body.len() + 1) * WORD_SIZE;
            iterate_body(&map, object, size, &mut WriteBarrierVisitor { heap: self });
        }
        object
    }

    fn struct_body(&self, map_id: MapId, fields: &[Value], data: &[usize]) -> Result<Vec<usize>> {
        let map = self.maps.try_get(map_id).ok_or_else(|| {
            NurseryError::InvalidArgument(format!("unknown map {:?}", map_id))
        })?;
        if map.visitor_id() != VisitorId::Struct {
            return Err(NurseryError::InvalidArgument(format!(
                "{:?} is not a struct map",
                map_id
            )));
        }
        let size = map.instance_size().unwrap_or(0);
        let data_fields = size / WORD_SIZE - 1 - map.pointer_fields();
        if fields.len() != map.pointer_fields() || data.len() != data_fields {
            return Err(NurseryError::InvalidArgument(format!(
                "struct map {:?} takes {} pointer and {} data fields, got {} and {}",
                map_id,
                map.pointer_fields(),
                data_fields,
                fields.len(),
                data.len()
            )));
        }
        Ok(fields
            .iter()
            .map(|value| value.raw())
            .chain(data.iter().copied())
            .collect())
    }

    /// Struct with tagged `fields` followed by raw `data` words
    pub fn new_struct(
        &self,
        map: MapId,
        fields: &[Value],
        data: &[usize],
        space: AllocationSpace,
    ) -> Result<HeapObject> {
        let body = self.struct_body(map, fields, data)?;
        let address = self.allocate_raw(space, (body.len() + 1) * WORD_SIZE)?;
        Ok(self.initialize_object(address, map, &body))
    }

    /// Young struct trailed by an allocation memento for `site`
    pub fn new_struct_with_memento(
        &self,
        map: MapId,
        fields: &[Value],
        data: &[usize],
        site: HeapObject,
    ) -> Result<HeapObject> {
        if self.check_object(site)?.visitor_id() != VisitorId::AllocationSite {
            return Err(NurseryError::InvalidArgument(format!(
                "{:?} is not an allocation site",
                site
            )));
        }
        if !self.maps.try_get(map).is_some_and(|m| m.tracks_allocation_sites()) {
            return Err(NurseryError::InvalidArgument(format!(
                "map {:?} does not track allocation sites",
                map
            )));
        }
        let body = self.struct_body(map, fields, data)?;
        let size = (body.len() + 1) * WORD_SIZE;
        let address = self.allocate_young(size + layout::ALLOCATION_MEMENTO_SIZE)?;
        let object = self.initialize_object(address, map, &body);
        self.initialize_object(address + size, ALLOCATION_MEMENTO_MAP, &[Value::from(site).raw()]);
        self.memory.fetch_add(
            site.address() + layout::SITE_CREATE_COUNT_OFFSET,
            Value::from_smi(1).raw(),
            Ordering::Relaxed,
        );
        Ok(object)
    }

    pub fn new_fixed_array(&self, elements: &[Value], space: AllocationSpace) -> Result<HeapObject> {
        let address = self.allocate_raw(space, fixed_array_size(elements.len()))?;
        let body: Vec<usize> = std::iter::once(Value::from_smi(elements.len()).raw())
            .chain(elements.iter().map(|value| value.raw()))
            .collect();
        Ok(self.initialize_object(address, FIXED_ARRAY_MAP, &body))
    }

    fn pack_bytes(bytes: &[u8]) -> Vec<usize> {
        std::iter::once(Value::from_smi(bytes.len()).raw())
            .chain(bytes.chunks(WORD_SIZE).map(|chunk| {
                let mut word = [0u8; WORD_SIZE];
                word[..chunk.len()].copy_from_slice(chunk);
                usize::from_le_bytes(word)
            }))
            .collect()
    }

    pub fn new_byte_array(&self, bytes: &[u8], space: AllocationSpace) -> Result<HeapObject> {
        let address = self.allocate_raw(space, byte_array_size(bytes.len()))?;
        Ok(self.initialize_object(address, BYTE_ARRAY_MAP, &Self::pack_bytes(bytes)))
    }

    pub fn new_string(&self, value: &str, space: AllocationSpace) -> Result<HeapObject> {
        let address = self.allocate_raw(space, byte_array_size(value.len()))?;
        Ok(self.initialize_object(address, SEQ_STRING_MAP, &Self::pack_bytes(value.as_bytes())))
    }

    /// Indirection to `actual`
    pub fn new_thin_string(&self, actual: HeapObject, space: AllocationSpace) -> Result<HeapObject> {
        let address = self.allocate_raw(space, layout::THIN_STRING_SIZE)?;
        Ok(self.initialize_object(address, THIN_STRING_MAP, &[Value::from(actual).raw()]))
    }

    pub fn new_cons_string(
        &self,
        first: HeapObject,
        second: HeapObject,
        space: AllocationSpace,
    ) -> Result<HeapObject> {
        let address = self.allocate_raw(space, layout::CONS_STRING_SIZE)?;
        Ok(self.initialize_object(
            address,
            CONS_STRING_MAP,
            &[Value::from(first).raw(), Value::from(second).raw()],
        ))
    }

    /// Function with an undefined `next_function_link`
    pub fn new_function(
        &self,
        shared: Value,
        context: Value,
        space: AllocationSpace,
    ) -> Result<HeapObject> {
        let address = self.allocate_raw(space, layout::FUNCTION_SIZE)?;
        Ok(self.initialize_object(
            address,
            JS_FUNCTION_MAP,
            &[shared.raw(), context.raw(), Value::UNDEFINED.raw()],
        ))
    }

    /// Allocation site with zeroed counters, always in old space
    pub fn new_allocation_site(&self) -> Result<HeapObject> {
        let address = self.allocate_old(layout::ALLOCATION_SITE_SIZE)?;
        Ok(self.initialize_object(
            address,
            ALLOCATION_SITE_MAP,
            &[Value::from_smi(0).raw(), Value::from_smi(0).raw()],
        ))
    }

    /// Overwrite `[address, address + size)` with dead space
    pub fn create_filler_object_at(&self, address: Address, size: usize) {
        if size == 0 {
            return;
        }
        if size == WORD_SIZE {
            self.memory.store(
                address,
                MapWord::from_map(ONE_POINTER_FILLER_MAP).raw(),
                Ordering::Relaxed,
            );
        } else {
            self.memory
                .store(address, MapWord::from_map(FREE_SPACE_MAP).raw(), Ordering::Relaxed);
            self.memory.store(
                address + layout::FREE_SPACE_SIZE_OFFSET,
                Value::from_smi(size).raw(),
                Ordering::Relaxed,
            );
        }
    }

    // ------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------

    pub fn create_handle(&self, value: Value) -> Result<Handle> {
        let handle = self.handles.acquire(false)?;
        self.store_slot(self.handles.slot(handle), value);
        Ok(handle)
    }

    /// Handle that does not keep its target alive
    pub fn create_weak_handle(&self, value: Value) -> Result<Handle> {
        let handle = self.handles.acquire(true)?;
        self.store_slot(self.handles.slot(handle), value);
        Ok(handle)
    }

    fn check_handle(&self, handle: Handle) -> Result<Slot> {
        if !self.handles.is_live(handle) {
            return Err(NurseryError::InvalidArgument(format!(
                "handle {} is not in use",
                handle.index()
            )));
        }
        Ok(self.handles.slot(handle))
    }

    pub fn handle_value(&self, handle: Handle) -> Result<Value> {
        Ok(self.load_slot(self.check_handle(handle)?))
    }

    /// Object a handle points at, if any
    pub fn handle_object(&self, handle: Handle) -> Result<Option<HeapObject>> {
        Ok(self.handle_value(handle)?.to_heap_object())
    }

    pub fn set_handle(&self, handle: Handle, value: Value) -> Result<()> {
        let slot = self.check_handle(handle)?;
        self.store_slot(slot, value);
        Ok(())
    }

    pub fn release_handle(&self, handle: Handle) -> Result<()> {
        let slot = self.check_handle(handle)?;
        self.store_slot(slot, Value::UNDEFINED);
        self.handles.release(handle)
    }

    /// Visit every strong root
    pub fn iterate_roots<V: RootVisitor>(&self, visitor: &mut V) {
        for slot in self.handles.strong_slots() {
            visitor.visit_root_pointer(Root::Handles, slot);
        }
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Objects of a space in address order, fillers skipped
    ///
    /// From-space can only be walked before a scavenge; afterwards its
    /// objects carry forwarding addresses instead of maps.
    pub fn objects_in(&self, id: SpaceId) -> Result<Vec<HeapObject>> {
        let space = self.space_by_id(id);
        let top = space.top();
        let mut address = space.start();
        let mut objects = Vec::new();
        while address < top {
            let object = HeapObject::from_address(address);
            let word = self.map_word(object);
            if word.is_forwarding_address() {
                return Err(NurseryError::Internal(format!(
                    "forwarded object at {:#x} in {:?}",
                    address, id
                )));
            }
            let map = self.maps.try_get(word.to_map()).ok_or_else(|| {
                NurseryError::Internal(format!("bad map word {:?} at {:#x}", word, address))
            })?;
            let size = size_from_map(&self.memory, &map, object);
            if size == 0 {
                return Err(NurseryError::Internal(format!("empty object at {:#x}", address)));
            }
            if !matches!(map.visitor_id(), VisitorId::Filler | VisitorId::FreeSpace) {
                objects.push(object);
            }
            address += size;
        }
        Ok(objects)
    }

    // ------------------------------------------------------------------
    // Scavenge
    // ------------------------------------------------------------------

    /// Run one young-generation collection
    ///
    /// Mutators must be paused; the call blocks until the pass finished.
    pub fn scavenge(&self) -> ScavengeOutcome {
        ScavengeJob::new(self).run()
    }

    /// Bytes copied within the new space by the last pass
    pub fn semi_space_copied_object_size(&self) -> usize {
        self.semi_space_copied_object_size.load(Ordering::Relaxed)
    }

    /// Bytes promoted by the last pass
    pub fn promoted_objects_size(&self) -> usize {
        self.promoted_objects_size.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_semi_space_copied_object_size(&self, bytes: usize) {
        self.semi_space_copied_object_size
            .fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn increment_promoted_objects_size(&self, bytes: usize) {
        self.promoted_objects_size.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn reset_survival_counters(&self) {
        self.semi_space_copied_object_size.store(0, Ordering::Relaxed);
        self.promoted_objects_size.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("memory", &self.memory)
            .field("new_space", &self.new_space)
            .field("old_space", &self.old_space)
            .field("gc_count", &self.gc_count())
            .finish()
    }
}

/// Records old-to-new slots of a freshly initialized old object
struct WriteBarrierVisitor<'h> {
    heap: &'h Heap,
}

impl ObjectVisitor for WriteBarrierVisitor<'_> {
    fn visit_pointers(&mut self, host: HeapObject, start: Slot, end: Slot) {
        for slot in Slot::range(start, end) {
            self.heap.record_write(host, slot, self.heap.load_slot(slot));
        }
    }
}
