//! Doubly-linked descriptor queue backed by a fixed-capacity arena.
//!
//! Descriptors are admitted once into numbered slots and never leave the arena. Ordering is
//! expressed through `next`/`prev` slot indices, so detaching and re-appending a descriptor is
//! O(1) and no link can ever dangle. All three scheduler lanes share a single queue through
//! [`SharedQueue`]; every method here assumes the caller holds that lock for the whole access.

use crate::descriptor::{Descriptor, DescriptorId};
use crate::error::{Result, SchedError};
use crate::priority::Priority;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// The queue as shared between scheduler lanes: one coarse lock over the whole structure.
pub type SharedQueue = Arc<Mutex<PriorityQueue>>;

/// Wrap a queue so it can be handed to the scheduler lanes.
pub fn shared(queue: PriorityQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}

/// Index of a descriptor slot inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Position of the slot in the arena (equal to admission order).
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Arena cell: the descriptor plus the links the queue owns on its behalf.
#[derive(Debug, Clone)]
struct Slot {
    descriptor: Descriptor,
    next: Option<SlotId>,
    prev: Option<SlotId>,
    /// False only between a `detach` and the matching `append`.
    linked: bool,
}

/// Ordered container of descriptors with O(1) detach and append.
#[derive(Debug, Clone)]
pub struct PriorityQueue {
    slots: Vec<Slot>,
    capacity: usize,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    /// Number of linked slots.
    len: usize,
}

impl PriorityQueue {
    /// Create an empty queue able to admit `capacity` descriptors.
    ///
    /// Nothing is allocated here; `capacity` only bounds admission. Use
    /// [`PriorityQueue::reserve`] to size the arena up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of descriptors currently linked into the queue.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no descriptor is linked (head is unset).
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    /// Borrow the descriptor stored in `slot`.
    pub fn get(&self, slot: SlotId) -> Option<&Descriptor> {
        self.slots.get(slot.0).map(|s| &s.descriptor)
    }

    /// Like [`PriorityQueue::get`], but reports a missing slot as an error.
    pub fn descriptor(&self, slot: SlotId) -> Result<&Descriptor> {
        self.slot(slot).map(|s| &s.descriptor)
    }

    /// Find the slot holding the descriptor with the given identity.
    pub fn slot_of(&self, id: DescriptorId) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.descriptor.id() == id)
            .map(SlotId)
    }

    fn slot(&self, slot: SlotId) -> Result<&Slot> {
        self.slots.get(slot.0).ok_or(SchedError::UnknownSlot(slot.0))
    }

    fn slot_mut(&mut self, slot: SlotId) -> Result<&mut Slot> {
        self.slots
            .get_mut(slot.0)
            .ok_or(SchedError::UnknownSlot(slot.0))
    }

    /// Grow the arena for up to `additional` more descriptors, never past the admission limit.
    ///
    /// # Returns
    /// [`SchedError::Reserve`] when the allocator refuses; the queue is left as it was
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let room = self.capacity.saturating_sub(self.slots.len());
        let requested = additional.min(room);
        self.slots
            .try_reserve_exact(requested)
            .map_err(|source| SchedError::Reserve { requested, source })
    }

    /// Admit a new descriptor and append it at the tail.
    ///
    /// When the queue is empty the descriptor becomes both head and tail.
    ///
    /// # Arguments
    /// * `descriptor` - Descriptor to admit
    ///
    /// # Returns
    /// The slot assigned to the descriptor, [`SchedError::QueueFull`] once `capacity`
    /// descriptors have been admitted, or [`SchedError::Construction`] if the arena cannot grow
    pub fn push(&mut self, descriptor: Descriptor) -> Result<SlotId> {
        if self.slots.len() >= self.capacity {
            return Err(SchedError::QueueFull {
                capacity: self.capacity,
            });
        }
        if let Err(e) = self.slots.try_reserve(1) {
            return Err(SchedError::Construction {
                id: descriptor.id(),
                reason: e.to_string(),
            });
        }

        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            descriptor,
            next: None,
            prev: None,
            linked: false,
        });
        self.link_tail(id);

        if let (Some(head), Some(tail)) = (self.head, self.tail) {
            debug!(
                tail = %self.slots[tail.0].descriptor.id(),
                head = %self.slots[head.0].descriptor.id(),
                "descriptor admitted"
            );
        }
        Ok(id)
    }

    /// Re-append a previously detached slot at the tail.
    pub fn append(&mut self, slot: SlotId) -> Result<()> {
        let entry = self.slot(slot)?;
        if entry.linked {
            return Err(SchedError::AlreadyLinked(entry.descriptor.id()));
        }
        self.link_tail(slot);
        Ok(())
    }

    /// Unlink `slot` from its current position, joining its neighbours directly.
    ///
    /// If `slot` is the head its successor becomes the new head. The tail can never be
    /// detached: the scheduler only detaches what the selector returned, and the selector never
    /// returns the tail.
    ///
    /// # Returns
    /// `Ok(())` once the slot is unlinked; [`SchedError::DetachTail`] or
    /// [`SchedError::NotLinked`] leave the queue unchanged
    pub fn detach(&mut self, slot: SlotId) -> Result<()> {
        let entry = self.slot(slot)?;
        if !entry.linked {
            return Err(SchedError::NotLinked(entry.descriptor.id()));
        }
        if self.tail == Some(slot) {
            return Err(SchedError::DetachTail(entry.descriptor.id()));
        }

        let (prev, next) = (entry.prev, entry.next);
        match prev {
            Some(p) => self.slots[p.0].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n.0].prev = prev,
            None => self.tail = prev,
        }

        let entry = &mut self.slots[slot.0];
        entry.next = None;
        entry.prev = None;
        entry.linked = false;
        self.len -= 1;
        Ok(())
    }

    /// Move `slot` from its current position to the tail.
    ///
    /// Population is conserved: the descriptor is relocated, never removed.
    pub fn requeue(&mut self, slot: SlotId) -> Result<()> {
        self.detach(slot)?;
        self.link_tail(slot);
        Ok(())
    }

    fn link_tail(&mut self, slot: SlotId) {
        let old_tail = self.tail;
        {
            let entry = &mut self.slots[slot.0];
            entry.prev = old_tail;
            entry.next = None;
            entry.linked = true;
        }
        match old_tail {
            Some(t) => self.slots[t.0].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    /// Find the most urgent descriptor strictly before the tail.
    ///
    /// Walks head to tail (exclusive) keeping a running minimum that starts at
    /// [`Priority::SENTINEL`]. Only a strictly smaller priority replaces the current candidate,
    /// so ties go to the descriptor closest to the head.
    ///
    /// # Returns
    /// The winning slot, or `None` when fewer than two descriptors are linked
    pub fn select_min(&self) -> Option<SlotId> {
        let tail = self.tail?;
        let mut min = Priority::SENTINEL;
        let mut best = None;

        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current == tail {
                break;
            }
            let entry = &self.slots[current.0];
            let priority = entry.descriptor.priority().get();
            if priority < min {
                min = priority;
                best = Some(current);
            }
            cursor = entry.next;
        }
        best
    }

    /// Follow `steps` successor links from the head.
    ///
    /// The walk is clamped to `len - 1` steps, so any step count lands on a linked descriptor
    /// and a long walk stops on the tail.
    pub fn walk(&self, steps: usize) -> Option<SlotId> {
        let steps = steps.min(self.len.saturating_sub(1));
        let mut cursor = self.head?;
        for _ in 0..steps {
            match self.slots[cursor.0].next {
                Some(next) => cursor = next,
                None => break,
            }
        }
        Some(cursor)
    }

    /// Overwrite the priority of the descriptor in `slot`.
    ///
    /// # Returns
    /// The priority the descriptor held before the write
    pub fn set_priority(&mut self, slot: SlotId, priority: Priority) -> Result<Priority> {
        Ok(self.slot_mut(slot)?.descriptor.set_priority(priority))
    }

    /// Iterate descriptors from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cursor: self.head,
            remaining: self.len,
            forward: true,
        }
    }

    /// Iterate descriptors from tail to head.
    pub fn iter_rev(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cursor: self.tail,
            remaining: self.len,
            forward: false,
        }
    }

    /// Identities in head-to-tail order.
    pub fn order(&self) -> Vec<DescriptorId> {
        self.iter().map(Descriptor::id).collect()
    }

    /// Check every structural invariant of the queue.
    ///
    /// Verifies that head and tail are consistent with the linked count, that the forward walk
    /// visits exactly `len` distinct linked slots ending at the tail with matching back links,
    /// and that the backward walk is the exact reverse.
    ///
    /// # Returns
    /// `Ok(())` for a well-formed queue, otherwise [`SchedError::Corrupted`] describing the
    /// first violation found
    pub fn validate(&self) -> Result<()> {
        let corrupted = |msg: String| Err(SchedError::Corrupted(msg));

        match (self.head, self.tail) {
            (None, None) if self.len == 0 => {}
            (Some(_), Some(_)) if self.len > 0 => {}
            (head, tail) => {
                return corrupted(format!(
                    "head {head:?} / tail {tail:?} inconsistent with length {}",
                    self.len
                ))
            }
        }

        let linked = self.slots.iter().filter(|s| s.linked).count();
        if linked != self.len {
            return corrupted(format!(
                "{linked} slots marked linked but length is {}",
                self.len
            ));
        }

        if let Some(head) = self.head {
            if self.slot(head)?.prev.is_some() {
                return corrupted("head has a predecessor".to_string());
            }
        }
        if let Some(tail) = self.tail {
            if self.slot(tail)?.next.is_some() {
                return corrupted("tail has a successor".to_string());
            }
        }

        // Forward walk.
        let mut visited = vec![false; self.slots.len()];
        let mut forward = Vec::with_capacity(self.len);
        let mut expected_prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let entry = self.slot(current)?;
            if visited[current.0] {
                return corrupted(format!("slot {} visited twice", current.0));
            }
            if !entry.linked {
                return corrupted(format!("detached slot {} reachable", current.0));
            }
            if entry.prev != expected_prev {
                return corrupted(format!(
                    "slot {} back link {:?} expected {:?}",
                    current.0, entry.prev, expected_prev
                ));
            }
            visited[current.0] = true;
            forward.push(current);
            expected_prev = Some(current);
            cursor = entry.next;
        }
        if forward.len() != self.len {
            return corrupted(format!(
                "forward walk visited {} slots, length is {}",
                forward.len(),
                self.len
            ));
        }
        if forward.last().copied() != self.tail {
            return corrupted("forward walk does not end at the tail".to_string());
        }

        // Backward walk must mirror the forward one.
        let mut cursor = self.tail;
        let mut steps = 0;
        while let Some(current) = cursor {
            if steps >= forward.len() || forward[forward.len() - 1 - steps] != current {
                return corrupted(format!("backward walk diverges at step {steps}"));
            }
            steps += 1;
            cursor = self.slot(current)?.prev;
        }
        if steps != forward.len() {
            return corrupted(format!(
                "backward walk visited {steps} slots, forward walk {}",
                forward.len()
            ));
        }
        Ok(())
    }
}

/// Borrowing iterator over linked descriptors in either direction.
///
/// Bounded by the linked count, so it terminates even on a damaged structure.
pub struct Iter<'a> {
    queue: &'a PriorityQueue,
    cursor: Option<SlotId>,
    remaining: usize,
    forward: bool,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Descriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.cursor?;
        let entry = self.queue.slots.get(current.0)?;
        self.cursor = if self.forward { entry.next } else { entry.prev };
        self.remaining -= 1;
        Some(&entry.descriptor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
