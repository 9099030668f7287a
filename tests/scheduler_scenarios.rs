// Scenario tests for the dispatch / interrupt / audit lanes over a hand-built queue

use std::sync::Arc;

use descriptor_scheduler::descriptor::{Descriptor, DescriptorId, DEFAULT_LABEL};
use descriptor_scheduler::priority::Priority;
use descriptor_scheduler::queue::{shared, PriorityQueue};
use descriptor_scheduler::report::DispatchReport;
use descriptor_scheduler::scheduler::audit::AuditTask;
use descriptor_scheduler::scheduler::dispatch::DispatchTask;
use descriptor_scheduler::scheduler::interrupt::InterruptTask;
use descriptor_scheduler::stats::LoopStats;

fn build_queue(priorities: &[u32]) -> PriorityQueue {
    let mut queue = PriorityQueue::with_capacity(priorities.len());
    for (i, p) in priorities.iter().enumerate() {
        queue
            .push(Descriptor::new(
                DescriptorId(i as u32),
                Priority::new(*p).unwrap(),
                DEFAULT_LABEL,
            ))
            .unwrap();
    }
    queue
}

fn ids(values: &[u32]) -> Vec<DescriptorId> {
    values.iter().copied().map(DescriptorId).collect()
}

#[test]
fn three_descriptor_dispatch_scenario() {
    let queue = shared(build_queue(&[50, 40, 60]));

    {
        let guard = queue.lock();
        let winner = guard.select_min().unwrap();
        let descriptor = guard.get(winner).unwrap();
        assert_eq!(descriptor.id(), DescriptorId(1));
        assert_eq!(descriptor.priority().get(), 40);
    }

    let stats = Arc::new(LoopStats::default());
    let mut dispatch = DispatchTask::new(queue.clone(), 17, stats.clone());
    let DispatchReport::Dispatched(dispatched) = dispatch.dispatch_once().unwrap() else {
        panic!("three descriptors must yield a dispatch");
    };
    assert_eq!(dispatched.id, DescriptorId(1));
    assert_eq!(dispatched.selected_priority.get(), 40);

    let mut audit = AuditTask::new(queue.clone(), stats.clone());
    let report = audit.audit_once();
    assert_eq!(report.order, ids(&[0, 2, 1]));
    assert!(report.is_consistent());

    // Descriptor 2 is now the last one the selector may consider.
    let guard = queue.lock();
    assert_eq!(guard.get(guard.tail().unwrap()).unwrap().id(), DescriptorId(1));
    let next = guard.get(guard.select_min().unwrap()).unwrap().id();
    assert_eq!(next, DescriptorId(0));
}

#[test]
fn selector_boundary_moves_with_the_tail() {
    // After the first dispatch the freshly requeued descriptor sits on the tail and is not
    // eligible, even if it was assigned the most urgent priority.
    let queue = shared(build_queue(&[90, 31, 95]));
    let stats = Arc::new(LoopStats::default());
    let mut dispatch = DispatchTask::new(queue.clone(), 5, stats);

    dispatch.dispatch_once().unwrap();
    assert_eq!(queue.lock().order(), ids(&[0, 2, 1]));

    {
        let mut guard = queue.lock();
        let tail = guard.tail().unwrap();
        guard.set_priority(tail, Priority::new(31).unwrap()).unwrap();
    }

    let DispatchReport::Dispatched(second) = dispatch.dispatch_once().unwrap() else {
        panic!("expected a dispatch");
    };
    assert_eq!(second.id, DescriptorId(0));
    assert_eq!(queue.lock().order(), ids(&[2, 1, 0]));
}

#[test]
fn single_descriptor_dispatch_leaves_structure_unchanged() {
    let queue = shared(build_queue(&[64]));
    let stats = Arc::new(LoopStats::default());
    let mut dispatch = DispatchTask::new(queue.clone(), 1, stats.clone());

    for _ in 0..10 {
        assert_eq!(dispatch.dispatch_once().unwrap(), DispatchReport::Idle);
    }

    let guard = queue.lock();
    assert_eq!(guard.order(), ids(&[0]));
    assert_eq!(guard.head(), guard.tail());
    assert_eq!(guard.get(guard.head().unwrap()).unwrap().priority().get(), 64);
    assert!(guard.validate().is_ok());
    assert_eq!(stats.snapshot().idle_dispatches, 10);
}

#[test]
fn interleaved_lanes_keep_population_and_ranges() {
    let queue = shared(build_queue(&[
        77, 45, 31, 100, 62, 58, 33, 91, 40, 40, 85, 66,
    ]));
    let stats = Arc::new(LoopStats::default());
    let mut dispatch = DispatchTask::new(queue.clone(), 21, stats.clone());
    let mut interrupt = InterruptTask::new(queue.clone(), 22, stats.clone());
    let mut audit = AuditTask::new(queue.clone(), stats.clone());

    for round in 0..1_000 {
        match round % 3 {
            0 => {
                dispatch.dispatch_once().unwrap();
            }
            1 => {
                interrupt.interrupt_once().unwrap();
            }
            _ => {
                let report = audit.audit_once();
                assert!(report.is_consistent(), "{:?}", report.violation);
                assert_eq!(report.order.len(), 12);
            }
        }
    }

    let guard = queue.lock();
    let mut seen = guard.order();
    seen.sort();
    assert_eq!(seen, (0..12).map(DescriptorId).collect::<Vec<_>>());
    assert!(guard
        .iter()
        .all(|d| (Priority::MIN..=Priority::MAX).contains(&d.priority().get())));
    assert_eq!(stats.snapshot().audit_violations, 0);
}
