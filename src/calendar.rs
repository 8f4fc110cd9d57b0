use crate::model::IndId;
use std::{cmp::Ordering, cmp::Reverse, collections::BinaryHeap};

/// Simulated time, in integer time units.
pub type Time = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Move,
    Death,
    Reproduce,
}

/// Event scheduled for one individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: Time,
    pub target: IndId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: Time, target: IndId, kind: EventKind) -> Self {
        Self { time, target, kind }
    }
}

// Events with equal times leave the calendar in insertion order.
#[derive(Debug)]
struct Entry {
    seq: u64,
    event: Event,
}

impl Entry {
    fn key(&self) -> (Time, u64) {
        (self.event.time, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Pending event calendar, a min-priority queue keyed by event time.
///
/// Scheduled events cannot be cancelled.
#[derive(Debug, Default)]
pub struct Calendar {
    heap: BinaryHeap<Reverse<Entry>>,
    n_pushed: u64,
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let seq = self.n_pushed;
        self.n_pushed += 1;
        self.heap.push(Reverse(Entry { seq, event }));
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(entry)| entry.event)
    }

    pub fn peek_time(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse(entry)| entry.event.time)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
