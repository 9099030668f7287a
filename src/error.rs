//! Error type shared by the queue, the scheduler lanes and the simulation driver.

use crate::descriptor::DescriptorId;
use thiserror::Error;

/// Every failure the scheduler core can report.
///
/// Structural errors (`DetachTail`, `NotLinked`, `AlreadyLinked`, `UnknownSlot`) are detected
/// before any link is written, so a rejected request always leaves the queue untouched.
#[derive(Debug, Error)]
pub enum SchedError {
    #[error("priority {value} outside of the valid range [{min}, {max}]")]
    PriorityOutOfRange { value: u32, min: u8, max: u8 },

    #[error("queue is full: all {capacity} descriptor slots are admitted")]
    QueueFull { capacity: usize },

    #[error("descriptor {0} is the tail and cannot be detached")]
    DetachTail(DescriptorId),

    #[error("descriptor {0} is not linked into the queue")]
    NotLinked(DescriptorId),

    #[error("descriptor {0} is already linked into the queue")]
    AlreadyLinked(DescriptorId),

    #[error("slot {0} does not exist")]
    UnknownSlot(usize),

    #[error("queue structure corrupted: {0}")]
    Corrupted(String),

    #[error("population must contain at least one descriptor")]
    EmptyPopulation,

    #[error("could not reserve arena room for {requested} descriptors: {source}")]
    Reserve {
        requested: usize,
        #[source]
        source: std::collections::TryReserveError,
    },

    #[error("descriptor index {0} does not fit a descriptor identity")]
    IdOverflow(usize),

    #[error("descriptor {id} could not be constructed: {reason}")]
    Construction { id: DescriptorId, reason: String },

    #[error("failed to spawn {lane} thread: {source}")]
    Spawn {
        lane: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SchedError>;
