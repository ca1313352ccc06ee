//! # Nursery - Parallel Young-Generation Scavenger
//!
//! Nursery is a semispace copying collector for the young generation of a
//! managed heap. A pass evacuates every live young object either into the
//! other semispace or, once it has survived before or is too large, into old
//! space, while several worker threads share the work.
//!
//! ## Overview
//!
//! - **Semispace Copying**: live objects are copied out of from-space; the
//!   rest is reclaimed wholesale by the next flip
//! - **Forwarding Words**: the map word of a moved object holds its new
//!   address, installed with a single CAS that also decides copy races
//! - **Segmented Worklists**: copied and promoted objects are scanned later
//!   from per-task segments; idle tasks steal whole segments
//! - **Remembered Set**: old-to-new slots recorded by the write barrier act
//!   as extra roots, processed page by page
//! - **String Shortcuts**: thin strings and flat cons strings are collapsed
//!   instead of copied
//! - **Pretenuring Feedback**: allocation mementos behind surviving objects
//!   are counted per allocation site
//!
//! ## Quick Start
//!
//! ```rust
//! use nursery::{AllocationSpace, Heap, ScavengerConfig, Value};
//!
//! fn main() -> Result<(), nursery::NurseryError> {
//!     let heap = Heap::new(ScavengerConfig {
//!         semi_space_size: 256 * 1024,
//!         old_space_size: 1024 * 1024,
//!         parallel_scavenge: false,
//!         ..Default::default()
//!     })?;
//!
//!     // Allocate a young string and keep it alive through a handle
//!     let greeting = heap.new_string("hello", AllocationSpace::NewSpace)?;
//!     let root = heap.create_handle(Value::from(greeting))?;
//!
//!     let outcome = heap.scavenge();
//!     assert_eq!(outcome.pass, 1);
//!
//!     // The handle now points at the copy
//!     let moved = heap.handle_object(root)?.unwrap();
//!     assert_eq!(heap.string_value(moved)?, "hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         Heap                             │
//! │  ┌──────────┐  ┌──────────────────────┐  ┌───────────┐  │
//! │  │ handles  │  │ new space (2 semis)  │  │ old space │  │
//! │  └────┬─────┘  └──────────┬───────────┘  └─────┬─────┘  │
//! │       │ roots             │ from-space         │ rem.set│
//! └───────┼───────────────────┼────────────────────┼────────┘
//!         ▼                   ▼                    ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ScavengeJob                          │
//! │  ┌────────────┐  ┌────────────┐       ┌────────────┐    │
//! │  │ Scavenger 0│  │ Scavenger 1│  ...  │ Scavenger N│    │
//! │  └─────┬──────┘  └─────┬──────┘       └─────┬──────┘    │
//! │        └───────────────┼────────────────────┘           │
//! │              CopiedList / PromotionList                  │
//! │                     Barrier                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Pass Phases
//!
//! 1. **Flip**: swap semispaces, empty the new to-space
//! 2. **Parallel**: tasks claim chunks of strong root slots and
//!    remembered-set pages, then drain worklists until the barrier detects
//!    global termination
//! 3. **Weak Handles**: follow forwarding addresses or clear
//! 4. **Finalize**: close LABs, merge feedback and counters, move the age mark
//!
//! ## Thread Safety
//!
//! - `Heap` is `Send + Sync`; mutator allocation may happen from several
//!   threads
//! - A scavenge needs every mutator to be paused; passes are serialized by
//!   an internal lock
//!
//! ## Modules
//!
//! - [`config`]: Scavenger configuration parameters and validation
//! - [`error`]: Error types and the fatal out-of-memory path
//! - [`heap`]: Spaces, handles, remembered set, marking state, allocation
//! - [`logging`]: Structured scavenge events
//! - [`memory`]: The word-addressed arena
//! - [`object`]: Tagged values, maps and body layouts
//! - [`scavenger`]: Evacuation, visitors, barrier and the job
//! - [`stats`]: Pause and survival statistics
//! - [`util`]: Constants and alignment helpers
//! - [`worklist`]: Segmented concurrent work queue

pub mod config;
pub mod error;

// Heap and object model
pub mod heap;
pub mod memory;
pub mod object;

// Collection
pub mod scavenger;
pub mod worklist;

// Monitoring
pub mod logging;
pub mod stats;

// Utilities
pub mod util;

pub use config::{ConfigError, ScavengerConfig};
pub use error::{NurseryError, Result};
pub use heap::{AllocationSpace, Handle, Heap, SlotCallbackResult, SpaceId};
pub use object::{HeapObject, MapId, Slot, Value, VisitorId};
pub use scavenger::{ScavengeJob, ScavengeOutcome};
pub use stats::ScavengeSummary;

/// Nursery version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a heap with the default configuration
pub fn init() -> Result<Heap> {
    Heap::new(ScavengerConfig::default())
}

/// Create a heap with `config`, falling back to `NURSERY_*` environment
/// variables via [`ScavengerConfig::from_env`] when `None`
pub fn init_with_config(config: Option<ScavengerConfig>) -> Result<Heap> {
    Heap::new(config.unwrap_or_else(ScavengerConfig::from_env))
}
