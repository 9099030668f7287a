//! Dispatch lane: pick the most urgent descriptor, give it a new priority, move it to the tail.
//!
//! Algorithm (one cycle, entirely under the queue lock):
//! 1. Run the selector over head..tail (tail excluded)
//! 2. Record the winner's identity, priority and label
//! 3. Assign it a fresh priority drawn uniformly from `[31, 100]`
//! 4. Requeue it at the tail
//!
//! With fewer than two linked descriptors nothing is eligible and the cycle is a no-op.

use crate::error::Result;
use crate::priority::Priority;
use crate::queue::SharedQueue;
use crate::report::{DispatchReport, Dispatched, SchedulerEvent};
use crate::scheduler::{Lane, PeriodicTask};
use crate::stats::LoopStats;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Dispatch lane state: the shared queue plus the lane's own RNG.
pub struct DispatchTask {
    queue: SharedQueue,
    rng: StdRng,
    stats: Arc<LoopStats>,
}

impl DispatchTask {
    /// # Arguments
    /// * `queue` - Queue shared with the other lanes
    /// * `seed` - Seed for the priorities this lane assigns
    /// * `stats` - Counters updated after every cycle
    pub fn new(queue: SharedQueue, seed: u64, stats: Arc<LoopStats>) -> Self {
        Self {
            queue,
            rng: StdRng::seed_from_u64(seed),
            stats,
        }
    }

    /// Perform one dispatch under the queue lock.
    pub fn dispatch_once(&mut self) -> Result<DispatchReport> {
        let mut queue = self.queue.lock();

        let Some(slot) = queue.select_min() else {
            self.stats.record_dispatch(true);
            trace!(len = queue.len(), "no eligible descriptor");
            return Ok(DispatchReport::Idle);
        };

        let (id, label) = {
            let descriptor = queue.descriptor(slot)?;
            (descriptor.id(), descriptor.label().to_string())
        };
        let assigned_priority = Priority::random(&mut self.rng);
        let selected_priority = queue.set_priority(slot, assigned_priority)?;
        queue.requeue(slot)?;
        drop(queue);

        self.stats.record_dispatch(false);
        trace!(%id, %selected_priority, %assigned_priority, "dispatched");
        Ok(DispatchReport::Dispatched(Dispatched {
            id,
            label,
            selected_priority,
            assigned_priority,
        }))
    }
}

impl PeriodicTask for DispatchTask {
    fn lane(&self) -> Lane {
        Lane::Dispatch
    }

    fn cycle(&mut self, at: Duration) -> Result<SchedulerEvent> {
        let report = self.dispatch_once()?;
        Ok(SchedulerEvent::Dispatch { at, report })
    }
}
