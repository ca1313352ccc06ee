//! Field offsets of the builtin object kinds
//!
//! ```text
//! FixedArray        [map, length(Smi), element...]
//! ByteArray         [map, length(Smi), raw bytes...]
//! SeqString         [map, length(Smi), raw bytes...]
//! ThinString        [map, actual]
//! ConsString        [map, first, second]
//! JsFunction        [map, shared, context, next_function_link]
//! AllocationSite    [map, memento_found_count(Smi), memento_create_count(Smi)]
//! AllocationMemento [map, site]
//! FreeSpace         [map, size(Smi), ...]
//! Struct            [map, pointer fields..., data words...]
//! ```

use crate::util::constants::WORD_SIZE;

pub const MAP_OFFSET: usize = 0;
pub const HEADER_SIZE: usize = WORD_SIZE;

/// Length word of arrays and strings
pub const LENGTH_OFFSET: usize = WORD_SIZE;
pub const ARRAY_HEADER_SIZE: usize = 2 * WORD_SIZE;

pub const THIN_STRING_ACTUAL_OFFSET: usize = WORD_SIZE;
pub const THIN_STRING_SIZE: usize = 2 * WORD_SIZE;

pub const CONS_STRING_FIRST_OFFSET: usize = WORD_SIZE;
pub const CONS_STRING_SECOND_OFFSET: usize = 2 * WORD_SIZE;
pub const CONS_STRING_SIZE: usize = 3 * WORD_SIZE;

pub const FUNCTION_SHARED_OFFSET: usize = WORD_SIZE;
pub const FUNCTION_CONTEXT_OFFSET: usize = 2 * WORD_SIZE;
pub const FUNCTION_NEXT_LINK_OFFSET: usize = 3 * WORD_SIZE;
pub const FUNCTION_SIZE: usize = 4 * WORD_SIZE;

pub const SITE_FOUND_COUNT_OFFSET: usize = WORD_SIZE;
pub const SITE_CREATE_COUNT_OFFSET: usize = 2 * WORD_SIZE;
pub const ALLOCATION_SITE_SIZE: usize = 3 * WORD_SIZE;

pub const MEMENTO_SITE_OFFSET: usize = WORD_SIZE;
pub const ALLOCATION_MEMENTO_SIZE: usize = 2 * WORD_SIZE;

pub const FREE_SPACE_SIZE_OFFSET: usize = WORD_SIZE;

/// Size of an array object with `length` tagged elements
#[inline]
pub const fn fixed_array_size(length: usize) -> usize {
    ARRAY_HEADER_SIZE + length * WORD_SIZE
}

/// Size of a byte array or sequential string holding `length` bytes
#[inline]
pub const fn byte_array_size(length: usize) -> usize {
    ARRAY_HEADER_SIZE + length.div_ceil(WORD_SIZE) * WORD_SIZE
}
