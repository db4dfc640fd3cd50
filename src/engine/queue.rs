// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::dag::ReadyJob;
use crate::types::{JobId, Priority};

/// Heap entry ordered so that `BinaryHeap` (a max-heap) pops the smallest
/// `(priority, id)` first.
struct Entry(ReadyJob);

impl Entry {
    fn key(&self) -> (Priority, JobId) {
        (self.0.priority, self.0.id)
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
        other.key().cmp(&self.key())
    }
}

/// Jobs whose dependencies are satisfied, waiting for a free worker.
///
/// Semantics:
/// - Lower priority values are popped first.
/// - Equal priorities pop in id order, and ids follow submission order, so
///   ties are FIFO.
/// - Once closed, the queue rejects new jobs and `pop` returns nothing. Jobs
///   still inside are left for the owner to drain.
#[derive(Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<Entry>,
    closed: bool,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Add a ready job. Hands the job back if the queue is closed.
    pub fn push(&mut self, job: ReadyJob) -> Result<(), ReadyJob> {
        if self.closed {
            return Err(job);
        }
        debug!(job_id = job.id, priority = job.priority, "job queued");
        self.heap.push(Entry(job));
        Ok(())
    }

    /// Take the most urgent job, unless the queue has been closed.
    pub fn pop(&mut self) -> Option<ReadyJob> {
        if self.closed {
            return None;
        }
        self.heap.pop().map(|e| e.0)
    }

    /// Id of the job `pop` would return next.
    pub fn peek_id(&self) -> Option<JobId> {
        self.heap.peek().map(|e| e.0.id)
    }

    /// Take a specific job back out of the queue, e.g. because it gained a
    /// dependency. `None` if a worker has already popped it.
    pub fn remove(&mut self, id: JobId) -> Option<ReadyJob> {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let removed = entries
            .iter()
            .position(|e| e.0.id == id)
            .map(|index| entries.swap_remove(index).0);
        self.heap = BinaryHeap::from(entries);
        if removed.is_some() {
            debug!(job_id = id, "job withdrawn from ready queue");
        }
        removed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Remove every remaining job in dispatch order.
    pub fn drain(&mut self) -> Vec<ReadyJob> {
        let mut jobs = Vec::with_capacity(self.heap.len());
        while let Some(entry) = self.heap.pop() {
            jobs.push(entry.0);
        }
        jobs
    }
}

impl std::fmt::Debug for ReadyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyQueue")
            .field("len", &self.heap.len())
            .field("closed", &self.closed)
            .finish()
    }
}
