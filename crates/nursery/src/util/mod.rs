//! Util Module - Shared Utilities
//!
//! Constants and small helpers used throughout the nursery.

/// Constants for the nursery
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;

    /// Size of one heap word in bytes
    pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

    /// log2(WORD_SIZE)
    pub const WORD_SIZE_LOG2: u32 = WORD_SIZE.trailing_zeros();

    /// Page size: 16KB
    ///
    /// Remembered-set bookkeeping and evacuation candidates are per page.
    pub const PAGE_SIZE: usize = 16 * KB;

    /// Heap words per page
    pub const WORDS_PER_PAGE: usize = PAGE_SIZE / WORD_SIZE;

    /// Entries per worklist segment
    pub const SEGMENT_SIZE: usize = 256;

    /// Worklist items processed between idle-sibling wakeups
    pub const INTERRUPT_THRESHOLD: usize = 128;

    /// Default semispace size: 4MB
    pub const DEFAULT_SEMI_SPACE_SIZE: usize = 4 * MB;

    /// Default old space size: 16MB
    pub const DEFAULT_OLD_SPACE_SIZE: usize = 16 * MB;

    /// Objects larger than this are promoted directly: 4KB
    pub const DEFAULT_LARGE_OBJECT_THRESHOLD: usize = 4 * KB;

    /// Default local allocation buffer size: 32KB
    pub const DEFAULT_LAB_SIZE: usize = 32 * KB;

    /// Largest object served from a LAB: 8KB
    pub const DEFAULT_MAX_LAB_OBJECT_SIZE: usize = 8 * KB;

    /// Default root handle capacity
    pub const DEFAULT_MAX_HANDLES: usize = 4096;

    /// Upper bound on parallel scavenge tasks
    pub const DEFAULT_MAX_TASKS: usize = 8;
}

/// Round `value` up to a multiple of `alignment` (a power of two)
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Check if `value` is a multiple of `alignment`
#[inline]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    value & (alignment - 1) == 0
}
