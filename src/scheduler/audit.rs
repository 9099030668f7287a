//! Audit lane: read-only head-to-tail traversal of the queue.
//!
//! The audit visits the tail as well (unlike the selector) and checks the structural invariants
//! on the same guard, so the reported order and the consistency verdict describe one state.

use crate::error::Result;
use crate::queue::SharedQueue;
use crate::report::{AuditReport, SchedulerEvent};
use crate::scheduler::{Lane, PeriodicTask};
use crate::stats::LoopStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, trace};

pub struct AuditTask {
    queue: SharedQueue,
    stats: Arc<LoopStats>,
}

impl AuditTask {
    pub fn new(queue: SharedQueue, stats: Arc<LoopStats>) -> Self {
        Self { queue, stats }
    }

    /// Traverse and validate the queue under its lock.
    pub fn audit_once(&mut self) -> AuditReport {
        let (order, violation) = {
            let queue = self.queue.lock();
            (queue.order(), queue.validate().err().map(|e| e.to_string()))
        };

        self.stats.record_audit(violation.is_none());
        match &violation {
            Some(violation) => error!(%violation, "queue invariant violated"),
            None => trace!(len = order.len(), "audit passed"),
        }
        AuditReport { order, violation }
    }
}

impl PeriodicTask for AuditTask {
    fn lane(&self) -> Lane {
        Lane::Audit
    }

    fn cycle(&mut self, at: Duration) -> Result<SchedulerEvent> {
        Ok(SchedulerEvent::Audit {
            at,
            report: self.audit_once(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Descriptor, DescriptorId, DEFAULT_LABEL};
    use crate::priority::Priority;
    use crate::queue::{shared, PriorityQueue};

    #[test]
    fn audit_reports_full_order_including_tail() {
        let mut queue = PriorityQueue::with_capacity(3);
        for (i, p) in [50, 40, 60].into_iter().enumerate() {
            queue
                .push(Descriptor::new(
                    DescriptorId(i as u32),
                    Priority::new(p).unwrap(),
                    DEFAULT_LABEL,
                ))
                .unwrap();
        }
        let slot = queue.select_min().unwrap();
        queue.requeue(slot).unwrap();

        let stats = Arc::new(LoopStats::default());
        let mut task = AuditTask::new(shared(queue), stats.clone());
        let report = task.audit_once();

        assert_eq!(
            report.order,
            vec![DescriptorId(0), DescriptorId(2), DescriptorId(1)]
        );
        assert!(report.is_consistent());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.audits, 1);
        assert_eq!(snapshot.audit_violations, 0);
    }

    #[test]
    fn audit_of_empty_queue_is_consistent() {
        let stats = Arc::new(LoopStats::default());
        let mut task = AuditTask::new(shared(PriorityQueue::with_capacity(0)), stats);
        let report = task.audit_once();
        assert!(report.order.is_empty());
        assert!(report.is_consistent());
    }
}
