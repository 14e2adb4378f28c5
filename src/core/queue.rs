//! Priority queue of pending jobs

use crate::job::Job;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A job waiting in the queue
struct QueuedJob {
    priority: i32,
    sequence: u64,
    job: Box<dyn Job>,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then earlier insertion
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Jobs ordered by descending priority
///
/// Equal priorities come out in insertion order, though nothing outside
/// this module relies on that.
#[derive(Default)]
pub struct JobQueue {
    heap: BinaryHeap<QueuedJob>,
    next_sequence: u64,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job at its current priority
    pub fn push(&mut self, job: Box<dyn Job>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedJob {
            priority: job.priority(),
            sequence,
            job,
        });
    }

    /// Remove the highest priority job
    pub fn pop(&mut self) -> Option<Box<dyn Job>> {
        self.heap.pop().map(|queued| queued.job)
    }

    /// Priority of the job `pop` would return
    pub fn peek_priority(&self) -> Option<i32> {
        self.heap.peek().map(|queued| queued.priority)
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("len", &self.heap.len())
            .field("top_priority", &self.peek_priority())
            .finish()
    }
}
