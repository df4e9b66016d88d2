//! Request dispatch, split into focused submodules.
//!
//! The [`LfsFetcher`] service owns everything a request needs: the
//! configuration, the [`FetchExecutor`], the event channel and, in queued
//! mode, the supersession queue.
//! - [`batch`] - One supervised pull per request (default mode)
//! - [`queue_worker`] - Legacy queued mode and its background worker

mod batch;
mod queue_worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
pub(crate) mod test_helpers;

pub use batch::FetchOutcome;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DispatchMode};
use crate::executor::FetchExecutor;
use crate::supersession::SupersessionQueue;
use crate::types::Event;

/// Capacity of the event channel; slow subscribers lag instead of blocking
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Service that turns fetch requests into pull tool invocations
#[derive(Clone)]
pub struct LfsFetcher {
    /// Daemon configuration (immutable after startup)
    pub(crate) config: Arc<Config>,
    /// Builds and starts pull tool invocations
    pub(crate) executor: FetchExecutor,
    /// Broadcast channel for events
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Current work queue, present only in queued mode
    pub(crate) queue: Option<Arc<SupersessionQueue>>,
    /// Root cancellation token; cancelled on shutdown
    pub(crate) shutdown: CancellationToken,
}

impl LfsFetcher {
    /// Create a fetcher for `config`
    ///
    /// Does not touch the filesystem or spawn anything; call
    /// [`Config::validate`] and [`FetchExecutor::resolve_program`] first to
    /// fail fast on a bad setup.
    pub fn new(config: Config) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let executor = FetchExecutor::new(&config);
        let queue = match config.mode {
            DispatchMode::Batched => None,
            DispatchMode::Queued => Some(Arc::new(SupersessionQueue::new())),
        };

        Self {
            config: Arc::new(config),
            executor,
            event_tx,
            queue,
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to fetch events
    ///
    /// Events emitted before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The executor used for every pull
    pub fn executor(&self) -> &FetchExecutor {
        &self.executor
    }

    /// Dispatch mode requests are served in
    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    /// Token cancelled when the daemon shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the queue worker and terminate every running pull
    pub fn shutdown(&self) {
        tracing::info!("shutting down fetcher");
        self.shutdown.cancel();
    }

    /// Emit an event to all subscribers
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }
}
