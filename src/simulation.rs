//! Simulation orchestration.
//!
//! This module seeds randomness, populates the shared queue, wires the three scheduler lanes to
//! a common event channel and statistics block, and owns the threads running them. It is the
//! only place that knows about threads; the lanes themselves are plain [`PeriodicTask`]s.

use crate::clock::Clock;
use crate::descriptor::{Descriptor, DescriptorId, DEFAULT_LABEL};
use crate::error::{Result, SchedError};
use crate::priority::Priority;
use crate::queue::{shared, PriorityQueue, SharedQueue};
use crate::report::{EventSink, SchedulerEvent};
use crate::scheduler::audit::AuditTask;
use crate::scheduler::dispatch::DispatchTask;
use crate::scheduler::interrupt::InterruptTask;
use crate::scheduler::{run_periodic, Lane, PeriodicTask};
use crate::stats::{LoopStats, StatsSnapshot};
use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Number of descriptors created when the caller does not choose one.
pub const DEFAULT_POPULATION: usize = 30;

/// Pause between consecutive cycles of each lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopIntervals {
    pub dispatch: Duration,
    pub interrupt: Duration,
    pub audit: Duration,
}

impl LoopIntervals {
    /// Same interval for every lane.
    pub const fn uniform(interval: Duration) -> Self {
        Self {
            dispatch: interval,
            interrupt: interval,
            audit: interval,
        }
    }

    pub const fn for_lane(&self, lane: Lane) -> Duration {
        match lane {
            Lane::Dispatch => self.dispatch,
            Lane::Interrupt => self.interrupt,
            Lane::Audit => self.audit,
        }
    }
}

impl Default for LoopIntervals {
    fn default() -> Self {
        Self {
            dispatch: Duration::from_secs(1),
            interrupt: Duration::from_secs(1),
            audit: Duration::from_secs(3),
        }
    }
}

/// Top-level simulation configuration used during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of descriptors to create (fixed for the lifetime of the simulation).
    pub population: usize,
    /// RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Label given to every descriptor.
    pub label: String,
    /// Per-lane pacing.
    pub intervals: LoopIntervals,
    /// Capacity of the event channel before events are dropped.
    pub event_capacity: usize,
    /// Stop each lane after this many cycles (`None` runs until shutdown).
    pub max_cycles: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION,
            seed: None,
            label: DEFAULT_LABEL.to_string(),
            intervals: LoopIntervals::default(),
            event_capacity: 1024,
            max_cycles: None,
        }
    }
}

/// Outcome of the initial population step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationReport {
    pub requested: usize,
    pub admitted: usize,
    /// Why population stopped early, if it did.
    pub error: Option<String>,
}

/// Admit up to `count` descriptors with sequential identities, in identity order.
///
/// Stops at the first descriptor that cannot be built or admitted. Everything admitted before
/// the failure stays in the queue, so the result is a consistent queue with fewer descriptors.
/// The arena is sized for the whole request first; if the allocator refuses, nothing is
/// admitted.
///
/// # Arguments
/// * `queue` - Queue to fill (normally empty)
/// * `count` - Number of descriptors requested
/// * `make` - Builds the descriptor for a given identity
pub fn populate<F>(queue: &mut PriorityQueue, count: usize, mut make: F) -> PopulationReport
where
    F: FnMut(DescriptorId) -> Result<Descriptor>,
{
    let mut report = PopulationReport {
        requested: count,
        admitted: 0,
        error: None,
    };

    if let Err(e) = queue.reserve(count) {
        warn!(requested = count, error = %e, "population refused");
        report.error = Some(e.to_string());
        return report;
    }

    for index in 0..count {
        let admitted = DescriptorId::try_from(index).and_then(|id| {
            let descriptor = make(id)?;
            let priority = descriptor.priority();
            queue.push(descriptor).map(|_| (id, priority))
        });
        match admitted {
            Ok((id, priority)) => {
                debug!(%id, %priority, "new descriptor");
                report.admitted += 1;
            }
            Err(e) => {
                warn!(index, error = %e, admitted = report.admitted, "population stopped early");
                report.error = Some(e.to_string());
                break;
            }
        }
    }
    report
}

/// Final state of one lane thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneSummary {
    pub lane: Lane,
    /// Cycles executed, or `None` if the thread panicked.
    pub cycles: Option<u64>,
}

/// Populated queue plus everything the lanes share.
pub struct Simulation {
    config: SimulationConfig,
    seed: u64,
    queue: SharedQueue,
    stats: Arc<LoopStats>,
    running: Arc<AtomicBool>,
    population: PopulationReport,
}

impl Simulation {
    /// Seed randomness and build the queue with random initial priorities.
    ///
    /// # Returns
    /// The simulation, or [`SchedError::EmptyPopulation`] when no descriptor could be admitted
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut queue = PriorityQueue::with_capacity(config.population);
        let label = config.label.clone();
        let population = populate(&mut queue, config.population, |id| {
            Ok(Descriptor::new(id, Priority::random(&mut rng), &label))
        });

        Self::assemble(config, seed, queue, population)
    }

    /// Build a simulation around a queue the caller already populated.
    pub fn with_queue(config: SimulationConfig, queue: PriorityQueue) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let population = PopulationReport {
            requested: queue.len(),
            admitted: queue.len(),
            error: None,
        };
        Self::assemble(config, seed, queue, population)
    }

    fn assemble(
        config: SimulationConfig,
        seed: u64,
        queue: PriorityQueue,
        population: PopulationReport,
    ) -> Result<Self> {
        if queue.is_empty() {
            return Err(SchedError::EmptyPopulation);
        }
        queue.validate()?;
        info!(
            seed,
            descriptors = queue.len(),
            requested = population.requested,
            "simulation initialised"
        );
        Ok(Self {
            config,
            seed,
            queue: shared(queue),
            stats: Arc::new(LoopStats::default()),
            running: Arc::new(AtomicBool::new(true)),
            population,
        })
    }

    /// Seed actually used (useful when the config left it to entropy).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn population(&self) -> &PopulationReport {
        &self.population
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Flag shared with every lane; clearing it stops them.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Build the three lanes over the shared queue, each with its own derived seed.
    pub fn lanes(&self) -> Vec<Box<dyn PeriodicTask>> {
        vec![
            Box::new(DispatchTask::new(
                self.queue.clone(),
                Lane::Dispatch.derive_seed(self.seed),
                self.stats.clone(),
            )),
            Box::new(InterruptTask::new(
                self.queue.clone(),
                Lane::Interrupt.derive_seed(self.seed),
                self.stats.clone(),
            )),
            Box::new(AuditTask::new(self.queue.clone(), self.stats.clone())),
        ]
    }

    /// Spawn one named thread per lane, all paced by `clock`.
    ///
    /// If a thread cannot be spawned the lanes already started are stopped and joined before the
    /// error is returned.
    pub fn start(&self, clock: Arc<dyn Clock>) -> Result<SimulationHandle> {
        let (sink, events) = EventSink::bounded(self.config.event_capacity, self.stats.clone());
        self.running.store(true, Ordering::Relaxed);

        let mut threads = Vec::with_capacity(Lane::ALL.len());
        for mut task in self.lanes() {
            let lane = task.lane();
            let interval = self.config.intervals.for_lane(lane);
            let max_cycles = self.config.max_cycles;
            let clock = clock.clone();
            let running = self.running.clone();
            let sink = sink.clone();

            let spawned = std::thread::Builder::new()
                .name(lane.thread_name().to_string())
                .spawn(move || {
                    run_periodic(
                        task.as_mut(),
                        clock.as_ref(),
                        interval,
                        &running,
                        &sink,
                        max_cycles,
                    )
                });

            match spawned {
                Ok(handle) => threads.push((lane, handle)),
                Err(source) => {
                    self.running.store(false, Ordering::Relaxed);
                    for (_, handle) in threads {
                        let _ = handle.join();
                    }
                    return Err(SchedError::Spawn {
                        lane: lane.thread_name(),
                        source,
                    });
                }
            }
        }

        info!(lanes = threads.len(), "scheduler lanes started");
        Ok(SimulationHandle { events, threads })
    }

    /// Signal every lane to stop after its current cycle.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Running lanes plus the receiving end of their event channel.
pub struct SimulationHandle {
    events: Receiver<SchedulerEvent>,
    threads: Vec<(Lane, JoinHandle<u64>)>,
}

impl SimulationHandle {
    pub fn events(&self) -> &Receiver<SchedulerEvent> {
        &self.events
    }

    /// True once every lane thread has returned.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Wait for every lane to return.
    ///
    /// Lanes only return once the running flag is cleared or their cycle budget is spent.
    pub fn join(self) -> Vec<LaneSummary> {
        self.threads
            .into_iter()
            .map(|(lane, handle)| {
                let cycles = match handle.join() {
                    Ok(cycles) => Some(cycles),
                    Err(_) => {
                        error!(%lane, "lane thread panicked");
                        None
                    }
                };
                LaneSummary { lane, cycles }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn config(population: usize) -> SimulationConfig {
        SimulationConfig {
            population,
            seed: Some(0xDEAD_BEEF),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn new_populates_in_id_order_with_valid_priorities() {
        let sim = Simulation::new(config(30)).unwrap();
        let queue = sim.queue().lock();
        assert_eq!(queue.len(), 30);
        assert_eq!(queue.order(), (0..30).map(DescriptorId).collect::<Vec<_>>());
        assert!(queue
            .iter()
            .all(|d| (Priority::MIN..=Priority::MAX).contains(&d.priority().get())));
        assert!(queue.iter().all(|d| d.label() == DEFAULT_LABEL));
        assert!(queue.validate().is_ok());
        assert_eq!(sim.population().admitted, 30);
    }

    #[test]
    fn same_seed_gives_same_population() {
        let a = Simulation::new(config(12)).unwrap();
        let b = Simulation::new(config(12)).unwrap();
        let priorities = |sim: &Simulation| {
            sim.queue()
                .lock()
                .iter()
                .map(|d| d.priority())
                .collect::<Vec<_>>()
        };
        assert_eq!(priorities(&a), priorities(&b));
    }

    #[test]
    fn empty_population_is_rejected() {
        assert!(matches!(
            Simulation::new(config(0)),
            Err(SchedError::EmptyPopulation)
        ));
    }

    #[test]
    fn populate_keeps_prefix_when_construction_fails() {
        let mut queue = PriorityQueue::with_capacity(10);
        let report = populate(&mut queue, 10, |id| {
            if id.0 == 4 {
                return Err(SchedError::Construction {
                    id,
                    reason: "out of memory".to_string(),
                });
            }
            Ok(Descriptor::new(id, Priority::new(60)?, DEFAULT_LABEL))
        });

        assert_eq!(report.requested, 10);
        assert_eq!(report.admitted, 4);
        assert!(report.error.is_some());
        assert_eq!(queue.order(), (0..4).map(DescriptorId).collect::<Vec<_>>());
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn oversized_population_is_refused_without_panicking() {
        let result = Simulation::new(SimulationConfig {
            population: usize::MAX / 8,
            seed: Some(1),
            ..SimulationConfig::default()
        });
        assert!(matches!(result, Err(SchedError::EmptyPopulation)));
    }

    #[test]
    fn populate_reports_refused_reservation() {
        let mut queue = PriorityQueue::with_capacity(usize::MAX);
        let mut built = 0;
        let report = populate(&mut queue, usize::MAX / 2, |id| {
            built += 1;
            Ok(Descriptor::new(id, Priority::new(40)?, DEFAULT_LABEL))
        });

        assert_eq!(built, 0);
        assert_eq!(report.admitted, 0);
        assert!(report.error.is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn populate_stops_at_capacity() {
        let mut queue = PriorityQueue::with_capacity(3);
        let report = populate(&mut queue, 5, |id| {
            Ok(Descriptor::new(id, Priority::new(40)?, DEFAULT_LABEL))
        });
        assert_eq!(report.admitted, 3);
        assert!(report.error.is_some());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn lanes_run_to_cycle_budget() {
        let sim = Simulation::new(SimulationConfig {
            max_cycles: Some(25),
            intervals: LoopIntervals::uniform(Duration::ZERO),
            ..config(8)
        })
        .unwrap();

        let handle = sim.start(Arc::new(ManualClock::new())).unwrap();
        let summaries = handle.join();

        assert_eq!(summaries.len(), 3);
        assert!(summaries.iter().all(|s| s.cycles == Some(25)));
        let stats = sim.stats();
        assert_eq!(stats.dispatches, 25);
        assert_eq!(stats.interrupts, 25);
        assert_eq!(stats.audits, 25);
        assert_eq!(stats.audit_violations, 0);
        assert_eq!(sim.queue().lock().len(), 8);
    }

    #[test]
    fn shutdown_stops_paused_lanes() {
        let sim = Simulation::new(config(5)).unwrap();
        let clock = Arc::new(ManualClock::new());
        let handle = sim.start(clock).unwrap();

        // The manual clock never advances, so lanes are parked in their first pause.
        sim.shutdown();
        let summaries = handle.join();
        assert!(summaries.iter().all(|s| s.cycles.is_some()));
    }
}
