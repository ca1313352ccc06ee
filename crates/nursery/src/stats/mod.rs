//! Stats Module - Scavenge Performance Monitoring
//!
//! Collects scavenger statistics for tuning and debugging:
//! - Pass count and pause time distribution
//! - Bytes copied within the new space and promoted to old space
//! - Per-kind survival counts (verbose mode only)

pub mod histogram;
pub mod timer;

pub use histogram::Histogram;
pub use timer::ScavengeTimer;

use crate::object::VisitorId;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Objects and bytes of one kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindCount {
    pub objects: u64,
    pub bytes: u64,
}

/// Per-kind survival counts of one worker or of the whole heap
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SurvivalCounts {
    pub copied: IndexMap<VisitorId, KindCount>,
    pub promoted: IndexMap<VisitorId, KindCount>,
}

impl SurvivalCounts {
    pub fn record_copied(&mut self, kind: VisitorId, size: usize) {
        let entry = self.copied.entry(kind).or_default();
        entry.objects += 1;
        entry.bytes += size as u64;
    }

    pub fn record_promoted(&mut self, kind: VisitorId, size: usize) {
        let entry = self.promoted.entry(kind).or_default();
        entry.objects += 1;
        entry.bytes += size as u64;
    }

    /// Add another worker's counts
    pub fn merge(&mut self, other: &SurvivalCounts) {
        for (kind, count) in &other.copied {
            let entry = self.copied.entry(*kind).or_default();
            entry.objects += count.objects;
            entry.bytes += count.bytes;
        }
        for (kind, count) in &other.promoted {
            let entry = self.promoted.entry(*kind).or_default();
            entry.objects += count.objects;
            entry.bytes += count.bytes;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.copied.is_empty() && self.promoted.is_empty()
    }
}

/// ScavengeStats - statistics collector for the heap
pub struct ScavengeStats {
    /// Completed passes
    passes: AtomicU64,
    /// Bytes copied within the new space, all passes
    bytes_copied: AtomicU64,
    /// Bytes promoted to old space, all passes
    bytes_promoted: AtomicU64,
    /// Bytes that survived the most recent pass
    last_survived: AtomicU64,
    /// Pause times in nanoseconds
    pause_stats: Histogram,
    survival: Mutex<SurvivalCounts>,
}

impl ScavengeStats {
    pub fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            bytes_promoted: AtomicU64::new(0),
            last_survived: AtomicU64::new(0),
            pause_stats: Histogram::new(),
            survival: Mutex::new(SurvivalCounts::default()),
        }
    }

    /// Record a finished pass
    pub fn record_pass(&self, duration: Duration, copied: usize, promoted: usize) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(copied as u64, Ordering::Relaxed);
        self.bytes_promoted.fetch_add(promoted as u64, Ordering::Relaxed);
        self.last_survived
            .store((copied + promoted) as u64, Ordering::Relaxed);
        self.pause_stats.record(duration.as_nanos() as u64);
    }

    /// Merge a worker's per-kind counts
    pub fn record_survival(&self, counts: &SurvivalCounts) {
        self.survival.lock().merge(counts);
    }

    pub fn survival(&self) -> SurvivalCounts {
        self.survival.lock().clone()
    }

    pub fn pause_histogram(&self) -> &Histogram {
        &self.pause_stats
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Get summary statistics
    pub fn summary(&self) -> ScavengeSummary {
        ScavengeSummary {
            passes: self.passes.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            bytes_promoted: self.bytes_promoted.load(Ordering::Relaxed),
            last_survived_bytes: self.last_survived.load(Ordering::Relaxed),
            avg_pause_ms: self.pause_stats.mean() as f64 / 1_000_000.0,
            max_pause_ms: self.pause_stats.max() as f64 / 1_000_000.0,
            p95_pause_ms: self.pause_stats.p95() as f64 / 1_000_000.0,
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        self.passes.store(0, Ordering::Relaxed);
        self.bytes_copied.store(0, Ordering::Relaxed);
        self.bytes_promoted.store(0, Ordering::Relaxed);
        self.last_survived.store(0, Ordering::Relaxed);
        self.pause_stats.clear();
        *self.survival.lock() = SurvivalCounts::default();
    }
}

impl Default for ScavengeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScavengeSummary {
    /// Completed passes
    pub passes: u64,
    /// Bytes copied within the new space
    pub bytes_copied: u64,
    /// Bytes promoted to old space
    pub bytes_promoted: u64,
    /// Survivors of the most recent pass
    pub last_survived_bytes: u64,
    /// Average pause time (ms)
    pub avg_pause_ms: f64,
    /// Max pause time (ms)
    pub max_pause_ms: f64,
    /// P95 pause time bucket (ms)
    pub p95_pause_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_pass() {
        let stats = ScavengeStats::new();
        stats.record_pass(Duration::from_millis(2), 100, 50);
        stats.record_pass(Duration::from_millis(4), 10, 0);

        let summary = stats.summary();
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.bytes_copied, 110);
        assert_eq!(summary.bytes_promoted, 50);
        assert_eq!(summary.last_survived_bytes, 10);
        assert!((summary.max_pause_ms - 4.0).abs() < 1e-9);

        stats.reset();
        assert_eq!(stats.summary().passes, 0);
    }

    #[test]
    fn test_survival_merge() {
        let stats = ScavengeStats::new();
        let mut worker = SurvivalCounts::default();
        worker.record_copied(VisitorId::Struct, 32);
        worker.record_copied(VisitorId::Struct, 32);
        worker.record_promoted(VisitorId::FixedArray, 128);

        stats.record_survival(&worker);
        stats.record_survival(&worker);

        let survival = stats.survival();
        assert_eq!(
            survival.copied[&VisitorId::Struct],
            KindCount { objects: 4, bytes: 128 }
        );
        assert_eq!(survival.promoted[&VisitorId::FixedArray].objects, 2);
    }

    #[test]
    fn test_summary_serializes() {
        let stats = ScavengeStats::new();
        stats.record_pass(Duration::from_micros(500), 64, 0);
        let json = serde_json::to_string(&stats.summary()).unwrap();
        assert!(json.contains("\"passes\":1"));
        assert!(json.contains("\"bytes_copied\":64"));
    }
}
