//! Interrupt lane: model an external event that changes some descriptor's priority.
//!
//! Each cycle draws a walk length uniformly from `[0, N)`, follows that many successor links from
//! the head (clamped so the walk stops at the tail), and gives the descriptor it lands on a fresh
//! priority. The queue order is left untouched.

use crate::error::Result;
use crate::priority::Priority;
use crate::queue::SharedQueue;
use crate::report::{InterruptReport, SchedulerEvent};
use crate::scheduler::{Lane, PeriodicTask};
use crate::stats::LoopStats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub struct InterruptTask {
    queue: SharedQueue,
    rng: StdRng,
    stats: Arc<LoopStats>,
}

impl InterruptTask {
    pub fn new(queue: SharedQueue, seed: u64, stats: Arc<LoopStats>) -> Self {
        Self {
            queue,
            rng: StdRng::seed_from_u64(seed),
            stats,
        }
    }

    /// Perform one interrupt under the queue lock.
    pub fn interrupt_once(&mut self) -> Result<InterruptReport> {
        let mut queue = self.queue.lock();

        let len = queue.len();
        if len == 0 {
            return Ok(InterruptReport::Idle);
        }
        let steps = self.rng.gen_range(0..len);
        let Some(slot) = queue.walk(steps) else {
            return Ok(InterruptReport::Idle);
        };

        let after = Priority::random(&mut self.rng);
        let before = queue.set_priority(slot, after)?;
        let id = queue.descriptor(slot)?.id();
        drop(queue);

        self.stats.record_interrupt();
        trace!(steps, %id, %before, %after, "priority interrupted");
        Ok(InterruptReport::Reprioritised {
            steps,
            id,
            before,
            after,
        })
    }
}

impl PeriodicTask for InterruptTask {
    fn lane(&self) -> Lane {
        Lane::Interrupt
    }

    fn cycle(&mut self, at: Duration) -> Result<SchedulerEvent> {
        let report = self.interrupt_once()?;
        Ok(SchedulerEvent::Interrupt { at, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Descriptor, DescriptorId, DEFAULT_LABEL};
    use crate::queue::{shared, PriorityQueue};
    use std::collections::HashSet;

    fn shared_queue(count: u32) -> SharedQueue {
        let mut queue = PriorityQueue::with_capacity(count as usize);
        for i in 0..count {
            queue
                .push(Descriptor::new(
                    DescriptorId(i),
                    Priority::new(50).unwrap(),
                    DEFAULT_LABEL,
                ))
                .unwrap();
        }
        shared(queue)
    }

    #[test]
    fn interrupt_rewrites_landed_descriptor_only() {
        let queue = shared_queue(5);
        let stats = Arc::new(LoopStats::default());
        let mut task = InterruptTask::new(queue.clone(), 3, stats.clone());

        let InterruptReport::Reprioritised {
            steps,
            id,
            before,
            after,
        } = task.interrupt_once().unwrap()
        else {
            panic!("expected an interrupt on a populated queue");
        };

        assert!(steps < 5);
        // Nothing was requeued, so the walk length is the landing position.
        assert_eq!(id, DescriptorId(steps as u32));
        assert_eq!(before.get(), 50);

        let guard = queue.lock();
        assert_eq!(guard.order(), (0..5).map(DescriptorId).collect::<Vec<_>>());
        for descriptor in guard.iter() {
            let expected = if descriptor.id() == id { after.get() } else { 50 };
            assert_eq!(descriptor.priority().get(), expected);
        }
        assert_eq!(stats.snapshot().interrupts, 1);
    }

    #[test]
    fn interrupt_reaches_head_and_tail() {
        let queue = shared_queue(4);
        let stats = Arc::new(LoopStats::default());
        let mut task = InterruptTask::new(queue, 11, stats);

        let mut landed = HashSet::new();
        for _ in 0..400 {
            if let InterruptReport::Reprioritised { id, after, .. } = task.interrupt_once().unwrap()
            {
                assert!((Priority::MIN..=Priority::MAX).contains(&after.get()));
                landed.insert(id);
            }
        }
        assert!(landed.contains(&DescriptorId(0)));
        assert!(landed.contains(&DescriptorId(3)));
    }

    #[test]
    fn interrupt_on_empty_queue_is_a_noop() {
        let queue = shared(PriorityQueue::with_capacity(2));
        let stats = Arc::new(LoopStats::default());
        let mut task = InterruptTask::new(queue, 3, stats.clone());
        assert_eq!(task.interrupt_once().unwrap(), InterruptReport::Idle);
        assert_eq!(stats.snapshot().interrupts, 0);
    }

    #[test]
    fn interrupt_on_single_descriptor_targets_it() {
        let queue = shared_queue(1);
        let stats = Arc::new(LoopStats::default());
        let mut task = InterruptTask::new(queue, 5, stats);
        let report = task.interrupt_once().unwrap();
        assert!(matches!(
            report,
            InterruptReport::Reprioritised {
                steps: 0,
                id: DescriptorId(0),
                ..
            }
        ));
    }
}
