//! Error Module - Nursery Error Types
//!
//! Defines the error types returned by the fallible set-up paths of the
//! nursery: configuration, heap construction, mutator-side allocation and
//! root handle management.
//!
//! A scavenge pass itself never returns an error. Running out of space
//! while evacuating is a fatal condition (see [`fatal_process_out_of_memory`]).
//!
//! # Error Categories
//!
//! ## Memory Errors
//! - `OutOfMemory` - Space exhaustion on a mutator allocation
//! - `InvalidAddress` - Address outside the arena or not an object
//! - `HandleExhausted` - Root handle space is full
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//! - `Internal` - Invariant violation

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all nursery operations
///
/// # Examples
///
/// ```rust
/// use nursery::NurseryError;
///
/// fn handle_error(err: NurseryError) {
///     match err {
///         NurseryError::OutOfMemory { requested, available } => {
///             eprintln!("OOM: requested {}, available {}", requested, available);
///         }
///         _ => eprintln!("Other error: {}", err),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum NurseryError {
    /// Out of memory - space exhaustion
    ///
    /// **When returned:** A mutator allocation exceeds the space left in
    /// the target space.
    ///
    /// **Recovery strategy:** Run a scavenge and retry, or allocate in old
    /// space.
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Invalid heap address
    ///
    /// **When returned:** An address lies outside the arena or inside the
    /// guard page.
    #[error("Invalid address: {address:#x}")]
    InvalidAddress { address: usize },

    /// Root handle space exhausted
    ///
    /// **Recovery strategy:** Release unused handles or raise
    /// `max_handles` in the configuration.
    #[error("Handle space exhausted: capacity {capacity}")]
    HandleExhausted { capacity: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Invalid argument
    ///
    /// **Example scenarios:**
    /// - Field index beyond the object's pointer fields
    /// - Struct map registered with zero words
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error - indicates a bug in the nursery
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NurseryError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NurseryError::OutOfMemory { .. } | NurseryError::HandleExhausted { .. }
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, NurseryError::Internal(_))
    }
}

/// Result type alias for nursery operations
pub type Result<T> = std::result::Result<T, NurseryError>;

/// Abort the current pass after an allocation failure during evacuation.
///
/// There is no way to unwind a half-finished scavenge: some slots already
/// point at new copies and others do not.
#[cold]
pub fn fatal_process_out_of_memory(location: &str, requested: usize) -> ! {
    log::error!(
        "Fatal process out of memory in {}: {} bytes requested",
        location,
        requested
    );
    crate::logging::log_event(crate::logging::ScavengeEvent::AllocationFailure {
        location: location.to_string(),
        requested,
    });
    panic!("Fatal process out of memory: {}", location);
}
