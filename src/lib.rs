pub mod clock;
pub mod descriptor;
pub mod error;
pub mod priority;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod simulation;
pub mod stats;

// Re-export for easier testing
pub use error::{Result, SchedError};
pub use queue::{PriorityQueue, SharedQueue, SlotId};
pub use simulation::{Simulation, SimulationConfig};
