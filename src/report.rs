//! Cycle reports emitted by the scheduler lanes.
//!
//! Each lane produces one typed report per cycle. Reports are forwarded to an observer through a
//! bounded crossbeam channel; the send never blocks a lane, and a full channel is counted as a
//! dropped event instead.

use crate::descriptor::DescriptorId;
use crate::priority::Priority;
use crate::stats::LoopStats;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Descriptor chosen and re-prioritised by one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub id: DescriptorId,
    pub label: String,
    /// Priority that won the selection.
    pub selected_priority: Priority,
    /// Fresh priority assigned before requeueing.
    pub assigned_priority: Priority,
}

/// Outcome of a dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchReport {
    Dispatched(Dispatched),
    /// Fewer than two descriptors were linked, so nothing was eligible.
    Idle,
}

/// Outcome of an interrupt cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InterruptReport {
    Reprioritised {
        /// Walk length drawn for this cycle (before clamping).
        steps: usize,
        id: DescriptorId,
        before: Priority,
        after: Priority,
    },
    /// The queue was empty.
    Idle,
}

/// Outcome of an audit cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Identities visited head to tail, tail included.
    pub order: Vec<DescriptorId>,
    /// First invariant violation found, if any.
    pub violation: Option<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.violation.is_none()
    }
}

/// One report from any lane, stamped with the clock time of the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "lane", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Dispatch { at: Duration, report: DispatchReport },
    Interrupt { at: Duration, report: InterruptReport },
    Audit { at: Duration, report: AuditReport },
}

impl fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerEvent::Dispatch { report, .. } => match report {
                DispatchReport::Dispatched(d) => write!(
                    f,
                    "dispatch: ptid {} prio {} desc {} -> new prio {}",
                    d.id, d.selected_priority, d.label, d.assigned_priority
                ),
                DispatchReport::Idle => write!(f, "dispatch: no eligible descriptor"),
            },
            SchedulerEvent::Interrupt { report, .. } => match report {
                InterruptReport::Reprioritised {
                    steps,
                    id,
                    before,
                    after,
                } => write!(
                    f,
                    "interrupt: walked {steps} -> ptid {id} prio {before} -> {after}"
                ),
                InterruptReport::Idle => write!(f, "interrupt: queue empty"),
            },
            SchedulerEvent::Audit { report, .. } => {
                write!(f, "audit:")?;
                for id in &report.order {
                    write!(f, " {id}")?;
                }
                if let Some(violation) = &report.violation {
                    write!(f, " [INCONSISTENT: {violation}]")?;
                }
                Ok(())
            }
        }
    }
}

/// Non-blocking sending half handed to every lane.
///
/// A sink without a channel discards events, which is what unit tests driving a single lane
/// usually want.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<Sender<SchedulerEvent>>,
    stats: Arc<LoopStats>,
}

impl EventSink {
    /// Create a bounded channel and the sink feeding it.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of undelivered events before new ones are dropped
    /// * `stats` - Counters receiving the drop count
    pub fn bounded(capacity: usize, stats: Arc<LoopStats>) -> (Self, Receiver<SchedulerEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (
            Self {
                sender: Some(tx),
                stats,
            },
            rx,
        )
    }

    /// Sink that drops every event without counting it.
    pub fn discard(stats: Arc<LoopStats>) -> Self {
        Self {
            sender: None,
            stats,
        }
    }

    /// Forward an event without blocking.
    ///
    /// A full channel increments the dropped-events counter; a disconnected observer is
    /// ignored, since lanes keep running whether or not anyone is watching.
    pub fn emit(&self, event: SchedulerEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.stats.record_dropped_event(),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prio(value: u32) -> Priority {
        Priority::new(value).unwrap()
    }

    fn audit(order: &[u32]) -> SchedulerEvent {
        SchedulerEvent::Audit {
            at: Duration::ZERO,
            report: AuditReport {
                order: order.iter().copied().map(DescriptorId).collect(),
                violation: None,
            },
        }
    }

    #[test]
    fn sink_counts_drops_when_channel_full() {
        let stats = Arc::new(LoopStats::default());
        let (sink, rx) = EventSink::bounded(1, stats.clone());

        sink.emit(audit(&[0, 1]));
        // Leave the first event in the channel so it remains full.
        sink.emit(audit(&[1, 0]));

        assert_eq!(stats.snapshot().dropped_events, 1);
        assert_eq!(rx.try_recv().unwrap(), audit(&[0, 1]));
    }

    #[test]
    fn sink_ignores_disconnected_observer() {
        let stats = Arc::new(LoopStats::default());
        let (sink, rx) = EventSink::bounded(1, stats.clone());
        drop(rx);
        sink.emit(audit(&[0]));
        assert_eq!(stats.snapshot().dropped_events, 0);
    }

    #[test]
    fn dispatch_event_renders_selected_values() {
        let event = SchedulerEvent::Dispatch {
            at: Duration::from_secs(1),
            report: DispatchReport::Dispatched(Dispatched {
                id: DescriptorId(1),
                label: "n".to_string(),
                selected_priority: prio(40),
                assigned_priority: prio(77),
            }),
        };
        assert_eq!(
            event.to_string(),
            "dispatch: ptid 1 prio 40 desc n -> new prio 77"
        );
    }

    #[test]
    fn audit_event_lists_order_including_tail() {
        assert_eq!(audit(&[0, 2, 1]).to_string(), "audit: 0 2 1");
    }

    #[test]
    fn events_serialize_with_lane_tag() {
        let event = SchedulerEvent::Interrupt {
            at: Duration::ZERO,
            report: InterruptReport::Reprioritised {
                steps: 4,
                id: DescriptorId(2),
                before: prio(60),
                after: prio(31),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["lane"], "interrupt");
        assert_eq!(json["report"]["outcome"], "reprioritised");
        assert_eq!(json["report"]["id"], 2);
        assert_eq!(json["report"]["before"], 60);
        assert_eq!(json["report"]["after"], 31);
    }
}
