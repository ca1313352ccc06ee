//! Scavenge Logging and Tracing
//!
//! Structured events for scavenge passes, useful for:
//! - Performance analysis
//! - Debugging
//! - Production monitoring
//!
//! Events are filtered by level, kept in a bounded buffer and forwarded to
//! the `log` facade, either human-readable or as one JSON object per event.
//!
//! Log Levels:
//! - ERROR: Fatal allocation failures
//! - INFO: Pass start/end
//! - DEBUG: Per-task results
//! - TRACE: Per-kind survival statistics

use crate::stats::SurvivalCounts;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log level for scavenge events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Scavenge event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScavengeEvent {
    /// Pass started
    PassStart {
        pass: u64,
        tasks: usize,
        remembered_set_pages: usize,
        new_space_used: usize,
    },

    /// One parallel task drained its work
    TaskFinished {
        pass: u64,
        task_id: usize,
        duration_ms: f64,
        bytes_copied: usize,
        bytes_promoted: usize,
    },

    /// Pass completed
    PassEnd {
        pass: u64,
        duration_ms: f64,
        bytes_copied: usize,
        bytes_promoted: usize,
        weak_handles_cleared: usize,
    },

    /// Per-kind survival counts (verbose mode)
    SurvivalStats { pass: u64, counts: SurvivalCounts },

    /// Evacuation ran out of space
    AllocationFailure { location: String, requested: usize },
}

impl ScavengeEvent {
    /// Level an event is logged at
    pub fn level(&self) -> LogLevel {
        match self {
            ScavengeEvent::AllocationFailure { .. } => LogLevel::Error,
            ScavengeEvent::PassStart { .. } | ScavengeEvent::PassEnd { .. } => LogLevel::Info,
            ScavengeEvent::TaskFinished { .. } => LogLevel::Debug,
            ScavengeEvent::SurvivalStats { .. } => LogLevel::Trace,
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct ScavengeLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Forward events to the `log` facade
    pub console: bool,

    /// Render events as JSON
    pub json: bool,

    /// Prefix rendered events with a local timestamp
    pub timestamps: bool,

    /// Events kept in the buffer; older ones are dropped
    pub max_events: usize,
}

impl Default for ScavengeLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
            json: false,
            timestamps: true,
            max_events: 1024,
        }
    }
}

/// Scavenge Logger - centralized event log
pub struct ScavengeLogger {
    config: ScavengeLoggerConfig,
    events: Mutex<VecDeque<(DateTime<Local>, ScavengeEvent)>>,
    enabled: AtomicBool,
}

impl ScavengeLogger {
    pub fn new(config: ScavengeLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log an event
    pub fn log(&self, event: ScavengeEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        if level > self.config.level {
            return;
        }

        let timestamp = Local::now();

        if self.config.console {
            let rendered = self.render(&timestamp, &event);
            log::log!(target: "nursery::scavenge", level.into(), "{}", rendered);
        }

        let mut events = self.events.lock();
        if events.len() == self.config.max_events {
            events.pop_front();
        }
        if self.config.max_events > 0 {
            events.push_back((timestamp, event));
        }
    }

    /// Render an event as one line
    pub fn render(&self, timestamp: &DateTime<Local>, event: &ScavengeEvent) -> String {
        let body = if self.config.json {
            Self::render_json(event)
        } else {
            Self::render_human(event)
        };
        if self.config.timestamps {
            format!("[{}] {}", timestamp.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        }
    }

    fn render_human(event: &ScavengeEvent) -> String {
        match event {
            ScavengeEvent::PassStart {
                pass,
                tasks,
                remembered_set_pages,
                new_space_used,
            } => format!(
                "[Scavenge] Pass {} started ({} tasks, {} remembered-set pages, {} bytes in new space)",
                pass, tasks, remembered_set_pages, new_space_used
            ),
            ScavengeEvent::TaskFinished {
                pass,
                task_id,
                duration_ms,
                bytes_copied,
                bytes_promoted,
            } => format!(
                "[Scavenge] Pass {} task {}: {:.2}ms, copied {} bytes, promoted {} bytes",
                pass, task_id, duration_ms, bytes_copied, bytes_promoted
            ),
            ScavengeEvent::PassEnd {
                pass,
                duration_ms,
                bytes_copied,
                bytes_promoted,
                weak_handles_cleared,
            } => format!(
                "[Scavenge] Pass {} completed ({:.2}ms, copied {} bytes, promoted {} bytes, {} weak handles cleared)",
                pass, duration_ms, bytes_copied, bytes_promoted, weak_handles_cleared
            ),
            ScavengeEvent::SurvivalStats { pass, counts } => {
                let mut line = format!("[Scavenge] Pass {} survivors:", pass);
                for (kind, count) in &counts.copied {
                    line.push_str(&format!(" copied {:?}={}/{}B", kind, count.objects, count.bytes));
                }
                for (kind, count) in &counts.promoted {
                    line.push_str(&format!(
                        " promoted {:?}={}/{}B",
                        kind, count.objects, count.bytes
                    ));
                }
                line
            }
            ScavengeEvent::AllocationFailure {
                location,
                requested,
            } => format!(
                "[Scavenge] Allocation failure in {}: {} bytes",
                location, requested
            ),
        }
    }

    fn render_json(event: &ScavengeEvent) -> String {
        serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }

    /// Get all buffered events
    pub fn events(&self) -> Vec<ScavengeEvent> {
        self.events
            .lock()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for ScavengeLogger {
    fn default() -> Self {
        Self::new(ScavengeLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<ScavengeLogger> = Mutex::new(ScavengeLogger::default());
}

/// Log an event to the global logger
pub fn log_event(event: ScavengeEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Replace the global logger
pub fn configure_logger(config: ScavengeLoggerConfig) {
    *GLOBAL_LOGGER.lock() = ScavengeLogger::new(config);
}

/// Global logger event count
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}

/// Events buffered by the global logger
pub fn get_events() -> Vec<ScavengeEvent> {
    GLOBAL_LOGGER.lock().events()
}
