//! Scheduler lanes and the loop that drives them.
//!
//! Three lanes share one [`SharedQueue`](crate::queue::SharedQueue):
//! - [`dispatch::DispatchTask`] selects the most urgent descriptor, re-prioritises it and moves
//!   it to the tail.
//! - [`interrupt::InterruptTask`] re-prioritises a descriptor found by a random walk from the
//!   head.
//! - [`audit::AuditTask`] traverses the queue head to tail and checks its invariants.
//!
//! Each lane implements [`PeriodicTask`]: one call to `cycle` is exactly one locked access to the
//! queue, and the guard is always dropped before the cycle returns. [`run_periodic`] alternates
//! cycles with clock pauses until the shared running flag is cleared.

pub mod audit;
pub mod dispatch;
pub mod interrupt;

use crate::clock::Clock;
use crate::error::Result;
use crate::report::{EventSink, SchedulerEvent};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// The three concurrent actors operating on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Dispatch,
    Interrupt,
    Audit,
}

impl Lane {
    /// All lanes in spawn order.
    pub const ALL: [Lane; 3] = [Lane::Dispatch, Lane::Interrupt, Lane::Audit];

    /// Name given to the OS thread running this lane.
    pub const fn thread_name(self) -> &'static str {
        match self {
            Lane::Dispatch => "Dispatch-Loop",
            Lane::Interrupt => "Interrupt-Loop",
            Lane::Audit => "Audit-Loop",
        }
    }

    /// Per-lane RNG seed derived from the simulation seed, so lanes draw independent streams.
    pub const fn derive_seed(self, seed: u64) -> u64 {
        let salt = match self {
            Lane::Dispatch => 0x9E37_79B9_7F4A_7C15,
            Lane::Interrupt => 0xC2B2_AE3D_27D4_EB4F,
            Lane::Audit => 0x1656_67B1_9E37_79F9,
        };
        seed ^ salt
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Lane::Dispatch => "dispatch",
            Lane::Interrupt => "interrupt",
            Lane::Audit => "audit",
        };
        write!(f, "{label}")
    }
}

/// A lane that performs one locked access to the queue per cycle.
pub trait PeriodicTask: Send {
    fn lane(&self) -> Lane;

    /// Run a single cycle stamped with clock time `at`.
    ///
    /// Implementations take the queue lock for the whole access and release it before
    /// returning.
    fn cycle(&mut self, at: Duration) -> Result<SchedulerEvent>;
}

/// Drive `task` until `running` is cleared or `max_cycles` cycles have completed.
///
/// Every cycle's event goes to `sink`. A failed cycle is logged and counted but does not stop the
/// lane: the queue rejects invalid requests before touching any link, so the structure is
/// still consistent.
///
/// # Arguments
/// * `task` - Lane to drive
/// * `clock` - Time source used for stamping and pausing
/// * `interval` - Pause between consecutive cycles
/// * `running` - Shared flag; clearing it stops the loop at the next check
/// * `sink` - Destination for cycle events
/// * `max_cycles` - Optional cycle budget (`None` runs until stopped)
///
/// # Returns
/// Number of cycles executed
pub fn run_periodic<T: PeriodicTask + ?Sized>(
    task: &mut T,
    clock: &dyn Clock,
    interval: Duration,
    running: &AtomicBool,
    sink: &EventSink,
    max_cycles: Option<u64>,
) -> u64 {
    let lane = task.lane();
    let mut cycles = 0u64;
    debug!(%lane, ?interval, "lane started");

    while running.load(Ordering::Relaxed) {
        match task.cycle(clock.now()) {
            Ok(event) => sink.emit(event),
            Err(e) => error!(%lane, error = %e, "cycle failed"),
        }
        cycles += 1;

        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
        clock.pause(interval, running);
    }

    debug!(%lane, cycles, "lane stopped");
    cycles
}
