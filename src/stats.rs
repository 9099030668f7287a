//! Per-lane counters shared by the scheduler threads.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the lanes after each cycle.
///
/// Relaxed ordering is sufficient: the counters are reporting data and never used to
/// synchronise access to the queue.
#[derive(Debug, Default)]
pub struct LoopStats {
    dispatches: AtomicU64,
    idle_dispatches: AtomicU64,
    interrupts: AtomicU64,
    audits: AtomicU64,
    audit_violations: AtomicU64,
    dropped_events: AtomicU64,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dispatches: u64,
    pub idle_dispatches: u64,
    pub interrupts: u64,
    pub audits: u64,
    pub audit_violations: u64,
    pub dropped_events: u64,
}

impl LoopStats {
    pub fn record_dispatch(&self, idle: bool) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        if idle {
            self.idle_dispatches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit(&self, consistent: bool) {
        self.audits.fetch_add(1, Ordering::Relaxed);
        if !consistent {
            self.audit_violations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            idle_dispatches: self.idle_dispatches.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
            audits: self.audits.load(Ordering::Relaxed),
            audit_violations: self.audit_violations.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }
}
