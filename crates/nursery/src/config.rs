//! Configuration Module - Scavenger Tuning Parameters
//!
//! Manages the parameters of the young-generation heap and its scavenger.
//! Space sizes decide how much survives in place; the LAB sizes and task
//! count decide how much the parallel workers contend on shared cursors.

use crate::util::constants::*;
use crate::util::is_aligned;

/// Main configuration for the nursery
///
/// # Examples
///
/// ```rust
/// use nursery::ScavengerConfig;
///
/// // Use default configuration
/// let config = ScavengerConfig::default();
///
/// // Small single-threaded heap for tests
/// let config = ScavengerConfig {
///     semi_space_size: 256 * 1024,
///     parallel_scavenge: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ScavengerConfig {
    /// Size of each semispace in bytes
    ///
    /// Two semispaces are reserved; only one holds objects between passes.
    /// Must be a multiple of the page size.
    ///
    /// Default: 4MB
    pub semi_space_size: usize,

    /// Size of the old space in bytes
    ///
    /// Promoted objects and allocation sites live here. Must be a multiple
    /// of the page size.
    ///
    /// Default: 16MB
    pub old_space_size: usize,

    /// Maximum number of root handles
    ///
    /// Default: 4096
    pub max_handles: usize,

    /// Objects larger than this many bytes are promoted instead of copied
    ///
    /// Default: 4KB
    pub large_object_threshold: usize,

    /// Size of each worker's local allocation buffer
    ///
    /// Default: 32KB
    pub lab_size: usize,

    /// Objects larger than this bypass the LAB and hit the shared cursor
    ///
    /// Default: 8KB
    pub max_lab_object_size: usize,

    /// Run the scavenge on several threads
    ///
    /// Default: true
    pub parallel_scavenge: bool,

    /// Number of scavenge tasks
    ///
    /// If None, derived from the semispace capacity (one task per MB),
    /// capped by `max_scavenge_tasks` and the number of CPUs.
    ///
    /// Default: Auto-detect
    pub scavenge_tasks: Option<usize>,

    /// Upper bound on scavenge tasks
    ///
    /// Default: 8
    pub max_scavenge_tasks: usize,

    /// Enable verbose logging
    ///
    /// Collects per-kind survival statistics and traces every migration.
    ///
    /// Default: false
    pub verbose: bool,

    /// Log per-task timing and byte counts after each pass
    ///
    /// Default: false
    pub trace_parallel_scavenge: bool,

    /// Collect allocation-site feedback from trailing mementos
    ///
    /// Default: true
    pub allocation_site_pretenuring: bool,
}

impl Default for ScavengerConfig {
    fn default() -> Self {
        ScavengerConfig {
            // Spaces
            semi_space_size: DEFAULT_SEMI_SPACE_SIZE,
            old_space_size: DEFAULT_OLD_SPACE_SIZE,
            max_handles: DEFAULT_MAX_HANDLES,

            // Evacuation
            large_object_threshold: DEFAULT_LARGE_OBJECT_THRESHOLD,
            lab_size: DEFAULT_LAB_SIZE,
            max_lab_object_size: DEFAULT_MAX_LAB_OBJECT_SIZE,

            // Threading
            parallel_scavenge: true,
            scavenge_tasks: None,
            max_scavenge_tasks: DEFAULT_MAX_TASKS,

            // Debug
            verbose: false,
            trace_parallel_scavenge: false,
            allocation_site_pretenuring: true,
        }
    }
}

impl ScavengerConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nursery::ScavengerConfig;
    ///
    /// let config = ScavengerConfig {
    ///     semi_space_size: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Space size validation
        if self.semi_space_size == 0 || !is_aligned(self.semi_space_size, PAGE_SIZE) {
            return Err(ConfigError::InvalidSpaceSize(format!(
                "semi_space_size must be a non-zero multiple of {} bytes",
                PAGE_SIZE
            )));
        }

        if self.old_space_size == 0 || !is_aligned(self.old_space_size, PAGE_SIZE) {
            return Err(ConfigError::InvalidSpaceSize(format!(
                "old_space_size must be a non-zero multiple of {} bytes",
                PAGE_SIZE
            )));
        }

        if self.max_handles == 0 {
            return Err(ConfigError::InvalidHandleCount(
                "max_handles must be > 0".to_string(),
            ));
        }

        // LAB validation
        if self.lab_size < WORD_SIZE || !is_aligned(self.lab_size, WORD_SIZE) {
            return Err(ConfigError::InvalidLabSize(
                "lab_size must be a non-zero multiple of the word size".to_string(),
            ));
        }

        if self.lab_size > self.semi_space_size {
            return Err(ConfigError::InvalidLabSize(
                "lab_size cannot exceed semi_space_size".to_string(),
            ));
        }

        if self.max_lab_object_size > self.lab_size {
            return Err(ConfigError::InvalidLabSize(
                "max_lab_object_size must be <= lab_size".to_string(),
            ));
        }

        // Threshold validation
        if self.large_object_threshold < WORD_SIZE {
            return Err(ConfigError::InvalidThreshold(
                "large_object_threshold must be at least one word".to_string(),
            ));
        }

        // Task validation
        if self.max_scavenge_tasks == 0 {
            return Err(ConfigError::InvalidTaskCount(
                "max_scavenge_tasks must be > 0".to_string(),
            ));
        }

        if let Some(tasks) = self.scavenge_tasks {
            if tasks == 0 {
                return Err(ConfigError::InvalidTaskCount(
                    "scavenge_tasks must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - NURSERY_SEMI_SPACE_SIZE
    /// - NURSERY_OLD_SPACE_SIZE
    /// - NURSERY_SCAVENGE_TASKS
    /// - NURSERY_PARALLEL
    /// - NURSERY_VERBOSE
    /// - NURSERY_TRACE_PARALLEL
    ///
    /// # Examples
    ///
    /// ```bash
    /// export NURSERY_SEMI_SPACE_SIZE=8388608  # 8MB
    /// export NURSERY_SCAVENGE_TASKS=4
    /// export NURSERY_VERBOSE=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse::<usize>("NURSERY_SEMI_SPACE_SIZE") {
            config.semi_space_size = size;
        }

        if let Some(size) = env_parse::<usize>("NURSERY_OLD_SPACE_SIZE") {
            config.old_space_size = size;
        }

        if let Some(tasks) = env_parse::<usize>("NURSERY_SCAVENGE_TASKS") {
            config.scavenge_tasks = Some(tasks);
        }

        if let Some(flag) = env_flag("NURSERY_PARALLEL") {
            config.parallel_scavenge = flag;
        }

        if let Some(flag) = env_flag("NURSERY_VERBOSE") {
            config.verbose = flag;
        }

        if let Some(flag) = env_flag("NURSERY_TRACE_PARALLEL") {
            config.trace_parallel_scavenge = flag;
        }

        config
    }

    /// Number of tasks a pass over a semispace of `capacity` bytes uses
    pub fn number_of_scavenge_tasks(&self, capacity: usize) -> usize {
        if !self.parallel_scavenge {
            return 1;
        }
        if let Some(tasks) = self.scavenge_tasks {
            return tasks.min(self.max_scavenge_tasks).max(1);
        }
        let by_capacity = capacity / MB;
        by_capacity
            .min(self.max_scavenge_tasks)
            .min(num_cpus::get())
            .max(1)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|val| val == "1" || val.eq_ignore_ascii_case("true"))
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid space size: {0}")]
    InvalidSpaceSize(String),

    #[error("Invalid handle count: {0}")]
    InvalidHandleCount(String),

    #[error("Invalid LAB size: {0}")]
    InvalidLabSize(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Invalid task count: {0}")]
    InvalidTaskCount(String),
}
