// Scheduler simulation binary
//
// Populates the descriptor queue, starts the dispatch, interrupt and audit lanes on their own
// threads, prints every lane report, and keeps running until Ctrl+C (or the optional run limit).

use clap::Parser;
use descriptor_scheduler::clock::SystemClock;
use descriptor_scheduler::report::SchedulerEvent;
use descriptor_scheduler::simulation::{LoopIntervals, Simulation, SimulationConfig};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line options parsed from program arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Priority dispatch simulation over a shared descriptor queue")]
struct CliOptions {
    /// Number of descriptors in the queue
    #[arg(long, default_value_t = 30)]
    population: usize,

    /// RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Label given to every descriptor
    #[arg(long, default_value = "n")]
    label: String,

    /// Pause between dispatch cycles, in milliseconds
    #[arg(long, default_value_t = 1000)]
    dispatch_ms: u64,

    /// Pause between interrupt cycles, in milliseconds
    #[arg(long, default_value_t = 1000)]
    interrupt_ms: u64,

    /// Pause between audit cycles, in milliseconds
    #[arg(long, default_value_t = 3000)]
    audit_ms: u64,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    run_for_secs: Option<u64>,

    /// Print lane reports as JSON lines
    #[arg(long)]
    json: bool,
}

impl CliOptions {
    fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            population: self.population,
            seed: self.seed,
            label: self.label.clone(),
            intervals: LoopIntervals {
                dispatch: Duration::from_millis(self.dispatch_ms),
                interrupt: Duration::from_millis(self.interrupt_ms),
                audit: Duration::from_millis(self.audit_ms),
            },
            ..SimulationConfig::default()
        }
    }
}

fn print_event(event: &SchedulerEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Failed to encode event: {}", e),
        }
    } else {
        println!("{event}");
    }
}

/// Main entry point for the simulation binary.
///
/// This function:
/// 1. Parses command-line arguments and installs the tracing subscriber
/// 2. Seeds randomness and populates the queue
/// 3. Starts the three lanes on the wall clock
/// 4. Prints lane reports until Ctrl+C or the run limit
/// 5. Joins the lanes and prints final counters
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = CliOptions::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let simulation = Simulation::new(options.to_config())?;
    info!(seed = simulation.seed(), "use --seed to replay this run");

    // Handle Ctrl+C
    let running = simulation.running();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    })?;

    let handle = simulation.start(Arc::new(SystemClock::new()))?;
    let deadline = options
        .run_for_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let running = simulation.running();
    while running.load(Ordering::Relaxed) && !handle.is_finished() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            simulation.shutdown();
            break;
        }
        match handle.events().recv_timeout(Duration::from_millis(100)) {
            Ok(event) => print_event(&event, options.json),
            Err(_) => continue,
        }
    }

    simulation.shutdown();
    for event in handle.events().try_iter() {
        print_event(&event, options.json);
    }
    let summaries = handle.join();

    let stats = simulation.stats();
    let population = simulation.population();
    if options.json {
        let summary = serde_json::json!({
            "seed": simulation.seed(),
            "population": population,
            "lanes": summaries,
            "stats": stats,
        });
        println!("{summary}");
    } else {
        match &population.error {
            Some(error) => println!(
                "population: {} of {} descriptors ({})",
                population.admitted, population.requested, error
            ),
            None => println!("population: {} descriptors", population.admitted),
        }
        for summary in &summaries {
            match summary.cycles {
                Some(cycles) => println!("{} lane: {} cycles", summary.lane, cycles),
                None => println!("{} lane: panicked", summary.lane),
            }
        }
        println!(
            "dispatches {} (idle {}), interrupts {}, audits {} (violations {}), dropped events {}",
            stats.dispatches,
            stats.idle_dispatches,
            stats.interrupts,
            stats.audits,
            stats.audit_violations,
            stats.dropped_events
        );
    }

    Ok(())
}
