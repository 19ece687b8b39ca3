#![forbid(unsafe_code)]

//! Deadline queue for cooperative timers.
//!
//! Timers never run on their own thread. Owners ask for the
//! [`next_deadline`](DeadlineQueue::next_deadline), wait at most that long,
//! then drain due entries with [`pop_due`](DeadlineQueue::pop_due) on the
//! thread that dispatches events.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;

/// Handle for cancelling a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Entry<T> {
    deadline: Instant,
    id: TimerId,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap yields the earliest deadline; ties go to the
    // entry scheduled first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Min-heap of deadlines with lazy cancellation.
pub struct DeadlineQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    cancelled: HashSet<TimerId>,
    next_id: u64,
}

impl<T> Default for DeadlineQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DeadlineQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> DeadlineQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedule `item` to become due at `deadline`.
    pub fn schedule(&mut self, deadline: Instant, item: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Entry { deadline, id, item });
        id
    }

    /// Cancel a scheduled entry. Unknown or already-fired ids are ignored.
    pub fn cancel(&mut self, id: TimerId) {
        if self.heap.iter().any(|e| e.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pop the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerId, T)> {
        self.discard_cancelled();
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|e| (e.id, e.item))
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if !self.cancelled.remove(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
