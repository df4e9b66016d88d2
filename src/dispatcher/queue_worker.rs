//! Legacy queued mode
//!
//! Requests are answered immediately; a single background worker pulls the
//! queued resources one at a time. A newer request supersedes whatever the
//! worker has not reached yet.

use tokio::task::JoinHandle;

use super::LfsFetcher;
use crate::error::{Error, Result};
use crate::supersession::{QueueEntry, SupersessionWorker, WorkerStep};
use crate::types::{Event, FetchRequest};

impl LfsFetcher {
    /// Replace the work queue with the resources of `request`
    ///
    /// Returns the generation of the new queue.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedRequest`] when `request.resources` is empty
    /// - [`Error::Config`] when the daemon does not run in queued mode
    /// - [`Error::ShuttingDown`] when the daemon is stopping
    pub fn enqueue(&self, request: &FetchRequest) -> Result<u64> {
        if request.resources.is_empty() {
            return Err(Error::MalformedRequest(
                "resources must not be empty".to_string(),
            ));
        }
        let queue = self.queue.as_ref().ok_or_else(|| Error::Config {
            message: "daemon is not running in queued mode".to_string(),
            key: Some("mode".to_string()),
        })?;
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let generation = queue.replace(request);
        tracing::info!(
            note = %request.note,
            generation,
            queued = request.resources.len(),
            "queued resources"
        );
        self.emit_event(Event::BatchQueued {
            generation,
            queued: request.resources.len(),
        });
        Ok(generation)
    }

    /// Spawn the background worker that drains the queue
    ///
    /// Returns `None` in batched mode. The worker stops when the fetcher is
    /// shut down.
    pub fn start_queue_worker(&self) -> Option<JoinHandle<()>> {
        let worker = self.queue.as_ref()?.worker();
        let fetcher = self.clone();
        Some(tokio::spawn(async move {
            fetcher.run_queue_worker(worker).await;
        }))
    }

    async fn run_queue_worker(&self, mut worker: SupersessionWorker) {
        let idle_wait = self.config.lfs.poll_interval;
        tracing::info!(generation = worker.generation(), "queue worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match worker.try_next() {
                WorkerStep::Entry { generation, entry } => {
                    let success = match self.pull_entry(&entry).await {
                        Ok(success) => success,
                        Err(e) => {
                            tracing::error!(
                                resource = %entry.resource,
                                error = %e,
                                "queued pull could not run"
                            );
                            false
                        }
                    };
                    self.emit_event(Event::ResourcePulled {
                        generation,
                        resource: entry.resource,
                        success,
                    });
                }
                WorkerStep::Superseded {
                    from,
                    to,
                    abandoned,
                } => {
                    if from != 0 {
                        tracing::warn!(
                            from,
                            to,
                            abandoned,
                            "current queue superseded by a newer request"
                        );
                    }
                    self.emit_event(Event::BatchSuperseded {
                        from,
                        to,
                        abandoned,
                    });
                }
                WorkerStep::Idle => {
                    tokio::select! {
                        _ = worker.wait_for_replacement(idle_wait) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
                WorkerStep::Closed => break,
            }
        }

        tracing::info!("queue worker stopped");
    }

    /// Pull a single queued resource, returning whether the tool succeeded
    async fn pull_entry(&self, entry: &QueueEntry) -> Result<bool> {
        let resources = std::slice::from_ref(&entry.resource);
        let mut operation = self.executor.start(resources)?;

        let exit_code = tokio::select! {
            code = operation.wait() => code?,
            _ = self.shutdown.cancelled() => {
                operation.terminate().await?;
                return Ok(false);
            }
        };

        if exit_code == 0 {
            tracing::info!(note = %entry.note, resource = %entry.resource, "pulled resource");
        } else {
            tracing::warn!(
                note = %entry.note,
                resource = %entry.resource,
                error = %Error::FetchToolFailure { exit_code },
                "queued pull failed"
            );
        }
        Ok(exit_code == 0)
    }
}
