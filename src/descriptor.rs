//! Process/thread descriptor records held by the priority queue.

use crate::error::SchedError;
use crate::priority::Priority;
use serde::Serialize;
use std::fmt;

/// Label given to every descriptor unless the caller picks another one.
pub const DEFAULT_LABEL: &str = "n";

/// Longest label a descriptor keeps; longer labels are truncated at a char boundary.
pub const MAX_LABEL_LEN: usize = 11;

/// Identity of a descriptor, assigned sequentially at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DescriptorId(pub u32);

impl TryFrom<usize> for DescriptorId {
    type Error = SchedError;

    /// Identity for the descriptor created at position `index`.
    fn try_from(index: usize) -> Result<Self, Self::Error> {
        u32::try_from(index)
            .map(DescriptorId)
            .map_err(|_| SchedError::IdOverflow(index))
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A simulated process or thread.
///
/// The descriptor carries only its own data. Links to neighbouring descriptors live in the
/// queue's arena slots, so a descriptor can be inspected or cloned without touching the
/// structure it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    id: DescriptorId,
    priority: Priority,
    label: String,
}

impl Descriptor {
    /// Create a descriptor with the given identity, initial priority and label.
    pub fn new(id: DescriptorId, priority: Priority, label: &str) -> Self {
        Self {
            id,
            priority,
            label: truncate_label(label),
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Only the queue rewrites priorities, and only while it is locked.
    pub(crate) fn set_priority(&mut self, priority: Priority) -> Priority {
        std::mem::replace(&mut self.priority, priority)
    }
}

fn truncate_label(label: &str) -> String {
    if label.len() <= MAX_LABEL_LEN {
        return label.to_string();
    }
    let mut end = MAX_LABEL_LEN;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}
