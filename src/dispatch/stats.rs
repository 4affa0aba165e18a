/*!
 * Dispatch Statistics
 * Lock-free counters for lifecycle activity, snapshotted on demand
 */

use crate::core::serde::{is_zero_u32, is_zero_u64};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic dispatch counters
///
/// All updates use relaxed ordering; counters are advisory and never gate a
/// lifecycle decision.
#[derive(Debug, Default)]
pub struct AtomicDispatchStats {
    streams_started: AtomicU64,
    streams_ended: AtomicU64,
    runs_opened: AtomicU64,
    runs_closed: AtomicU64,
    lumis_opened: AtomicU64,
    lumis_closed: AtomicU64,
    events_processed: AtomicU64,
    violations: AtomicU64,
}

impl AtomicDispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_streams_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_streams_ended(&self) {
        self.streams_ended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_runs_opened(&self) {
        self.runs_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_runs_closed(&self) {
        self.runs_closed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_lumis_opened(&self) {
        self.lumis_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_lumis_closed(&self) {
        self.lumis_closed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_events(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_violations(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Read-only snapshot, no synchronization required
    pub fn snapshot(&self, lane_count: u32) -> DispatchStats {
        DispatchStats {
            lane_count,
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_ended: self.streams_ended.load(Ordering::Relaxed),
            runs_opened: self.runs_opened.load(Ordering::Relaxed),
            runs_closed: self.runs_closed.load(Ordering::Relaxed),
            lumis_opened: self.lumis_opened.load(Ordering::Relaxed),
            lumis_closed: self.lumis_closed.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time dispatch statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchStats {
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub lane_count: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub streams_started: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub streams_ended: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub runs_opened: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub runs_closed: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub lumis_opened: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub lumis_closed: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub events_processed: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub violations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = AtomicDispatchStats::new();
        stats.inc_events();
        stats.inc_events();
        stats.inc_runs_opened();

        let snap = stats.snapshot(2);
        assert_eq!(snap.events_processed, 2);
        assert_eq!(snap.runs_opened, 1);
        assert_eq!(snap.lane_count, 2);
        assert_eq!(snap.violations, 0);
    }
}
