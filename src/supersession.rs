//! Generation-tagged work queue for the legacy queued mode
//!
//! Every request replaces the whole queue. Each replacement gets the next
//! generation number; the single worker compares the generation it is
//! draining with the current one before every step and, when they differ,
//! drops whatever it had not read yet and moves to the new queue.
//!
//! Delivery is at-most-once and best-effort: an entry superseded before the
//! worker reaches it is never pulled, and nothing tells the original caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::types::FetchRequest;

/// One resource waiting to be pulled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    /// Note the resource was requested from
    pub note: String,
    /// Resource path relative to the working directory
    pub resource: String,
}

#[derive(Debug)]
struct Batch {
    generation: u64,
    entries: Mutex<VecDeque<QueueEntry>>,
}

impl Batch {
    fn new(generation: u64, entries: VecDeque<QueueEntry>) -> Self {
        Self {
            generation,
            entries: Mutex::new(entries),
        }
    }

    fn pop(&self) -> Option<QueueEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    fn remaining(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Producer side: holds the current queue
#[derive(Debug)]
pub struct SupersessionQueue {
    current: watch::Sender<Arc<Batch>>,
}

impl Default for SupersessionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SupersessionQueue {
    /// Create an empty queue at generation 0
    pub fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(Batch::new(0, VecDeque::new())));
        Self { current }
    }

    /// Generation of the current queue
    pub fn generation(&self) -> u64 {
        self.current.borrow().generation
    }

    /// Replace the current queue with the resources of `request`
    ///
    /// Returns the generation of the new queue. Never blocks on the worker.
    pub fn replace(&self, request: &FetchRequest) -> u64 {
        let entries: VecDeque<QueueEntry> = request
            .resources
            .iter()
            .map(|resource| QueueEntry {
                note: request.note.clone(),
                resource: resource.clone(),
            })
            .collect();

        let mut generation = 0;
        self.current.send_modify(|batch| {
            generation = batch.generation + 1;
            *batch = Arc::new(Batch::new(generation, entries));
        });
        generation
    }

    /// Create the consumer, starting at the current queue
    pub fn worker(&self) -> SupersessionWorker {
        let current = self.current.subscribe();
        let local = Arc::clone(&current.borrow());
        SupersessionWorker { current, local }
    }
}

/// What the worker should do next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerStep {
    /// Pull this entry
    Entry {
        /// Generation the entry belongs to
        generation: u64,
        /// The entry itself
        entry: QueueEntry,
    },
    /// The queue was replaced; `abandoned` unread entries were dropped
    Superseded {
        /// Generation the worker was draining
        from: u64,
        /// Generation it now drains
        to: u64,
        /// Entries of the old queue that will never be pulled
        abandoned: usize,
    },
    /// Nothing to do right now
    Idle,
    /// The queue was dropped; the worker should stop
    Closed,
}

/// Consumer side: drains one queue at a time
#[derive(Debug)]
pub struct SupersessionWorker {
    current: watch::Receiver<Arc<Batch>>,
    local: Arc<Batch>,
}

impl SupersessionWorker {
    /// Generation currently being drained
    pub fn generation(&self) -> u64 {
        self.local.generation
    }

    /// Take the next step without waiting
    pub fn try_next(&mut self) -> WorkerStep {
        let latest = Arc::clone(&self.current.borrow_and_update());
        if latest.generation != self.local.generation {
            let from = self.local.generation;
            let abandoned = self.local.remaining();
            self.local = latest;
            return WorkerStep::Superseded {
                from,
                to: self.local.generation,
                abandoned,
            };
        }

        match self.local.pop() {
            Some(entry) => WorkerStep::Entry {
                generation: self.local.generation,
                entry,
            },
            None if self.current.has_changed().is_err() => WorkerStep::Closed,
            None => WorkerStep::Idle,
        }
    }

    /// Wait at most `timeout` for a replacement queue
    ///
    /// Returns early as soon as a new queue is installed, so an idle worker
    /// notices new work promptly without spinning.
    pub async fn wait_for_replacement(&mut self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.current.changed()).await;
    }
}
