//! Priority values and the helpers used to draw them.

use crate::error::{Result, SchedError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority of a descriptor. Lower numbers are dispatched first.
///
/// The value is always inside [`Priority::MIN`]..=[`Priority::MAX`]; the only way to build one is
/// through [`Priority::new`] or [`Priority::random`], both of which enforce the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Highest precedence a descriptor can hold.
    pub const MIN: u8 = 31;
    /// Lowest precedence a descriptor can hold.
    pub const MAX: u8 = 100;
    /// Raw value the selector starts its running minimum from.
    ///
    /// Strictly greater than every legal priority, so the first eligible descriptor always
    /// replaces it.
    pub const SENTINEL: u8 = u8::MAX;

    /// Validate and wrap a raw priority.
    ///
    /// # Arguments
    /// * `value` - Raw priority (lower is more urgent)
    ///
    /// # Returns
    /// The wrapped priority, or [`SchedError::PriorityOutOfRange`] when `value` is outside
    /// `[31, 100]`
    pub fn new(value: u32) -> Result<Self> {
        if value < u32::from(Self::MIN) || value > u32::from(Self::MAX) {
            return Err(SchedError::PriorityOutOfRange {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(value as u8))
    }

    /// Draw a priority uniformly from `[31, 100]`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(Self::MIN..=Self::MAX))
    }

    /// Raw numeric value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = SchedError;

    fn try_from(value: u8) -> Result<Self> {
        Priority::new(u32::from(value))
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
