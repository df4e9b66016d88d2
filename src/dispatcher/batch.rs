//! Batched mode: one supervised pull per request

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::LfsFetcher;
use crate::classifier;
use crate::error::{Error, Result};
use crate::types::{Event, FetchRequest, ResourceOutcome};
use crate::watcher::DisconnectProbe;

/// How a batched fetch ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tool exited on its own; one outcome per requested resource
    Completed {
        /// Exit code of the pull tool
        exit_code: i32,
        /// Outcomes in request order
        outcomes: Vec<ResourceOutcome>,
    },
    /// The client went away (or the request was cancelled) and the tool was
    /// terminated; nobody is waiting for an answer
    Abandoned,
}

impl FetchOutcome {
    /// Whether the tool exited with status 0
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Completed { exit_code: 0, .. })
    }
}

impl LfsFetcher {
    /// Pull every resource of `request` with a single tool invocation
    ///
    /// Modification times are captured first, then the tool is started and
    /// polled once per `lfs.poll_interval`. Between polls `probe` is asked
    /// whether the client is still there; if it is gone, or `cancel` fires,
    /// the tool is terminated and reaped and [`FetchOutcome::Abandoned`] is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedRequest`] when `request.resources` is empty
    /// - [`Error::ShuttingDown`] when the daemon is stopping
    /// - [`Error::Spawn`] when the tool could not be started
    pub async fn fetch_batch(
        &self,
        request: &FetchRequest,
        probe: &dyn DisconnectProbe,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        if request.resources.is_empty() {
            return Err(Error::MalformedRequest(
                "resources must not be empty".to_string(),
            ));
        }
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let working_dir = &self.config.working_dir;
        let snapshots = classifier::snapshot(working_dir, &request.resources);

        tracing::info!(
            note = %request.note,
            resources = request.resources.len(),
            dry_run = self.executor.is_dry_run(),
            "pulling resources"
        );
        self.emit_event(Event::FetchStarted {
            note: request.note.clone(),
            resources: request.resources.len(),
        });

        let mut operation = self.executor.start(&request.resources)?;
        let interval = self.config.lfs.poll_interval;

        let exit_code = loop {
            tokio::select! {
                polled = operation.poll_exit(interval) => match polled {
                    Ok(Some(code)) => break code,
                    Ok(None) => {}
                    Err(e) => {
                        if let Err(cleanup) = operation.terminate().await {
                            tracing::warn!(
                                pid = operation.pid(),
                                error = %cleanup,
                                "failed to terminate pull tool after wait error"
                            );
                        }
                        return Err(e);
                    }
                },
                _ = cancel.cancelled() => {}
            }

            if cancel.is_cancelled() || probe.is_disconnected() {
                tracing::warn!(
                    note = %request.note,
                    pid = operation.pid(),
                    resources = operation.resources().len(),
                    "client disconnected before pull finished, terminating"
                );
                operation.terminate().await?;
                self.emit_event(Event::ClientAbandoned {
                    note: request.note.clone(),
                });
                return Ok(FetchOutcome::Abandoned);
            }
        };

        let outcomes = classifier::classify(working_dir, exit_code, &snapshots);
        let updated = count(&outcomes, ResourceOutcome::Updated);
        let failed = count(&outcomes, ResourceOutcome::Failed);

        if exit_code == 0 {
            tracing::info!(note = %request.note, updated, failed, "pull finished");
        } else {
            tracing::warn!(
                note = %request.note,
                error = %Error::FetchToolFailure { exit_code },
                "pull failed"
            );
        }
        self.emit_event(Event::FetchCompleted {
            note: request.note.clone(),
            exit_code,
            updated,
            failed,
        });

        Ok(FetchOutcome::Completed {
            exit_code,
            outcomes,
        })
    }

    /// Run [`fetch_batch`](Self::fetch_batch) in its own task and await it
    ///
    /// The caller holds the task's cancellation guard: if the future
    /// returned here is dropped (for example because the HTTP server gave
    /// up on the connection), the task is cancelled and terminates the
    /// tool. Daemon shutdown cancels it as well.
    pub async fn fetch_supervised(
        self: &Arc<Self>,
        request: FetchRequest,
        probe: Arc<dyn DisconnectProbe>,
    ) -> Result<FetchOutcome> {
        let cancel = self.shutdown.child_token();
        let guard = cancel.clone().drop_guard();

        let fetcher = Arc::clone(self);
        let task = tokio::spawn(async move {
            fetcher
                .fetch_batch(&request, probe.as_ref(), &cancel)
                .await
        });

        let result = task
            .await
            .map_err(|e| Error::ApiServerError(format!("fetch task failed: {e}")))?;
        guard.disarm();
        result
    }
}

fn count(outcomes: &[ResourceOutcome], wanted: ResourceOutcome) -> usize {
    outcomes.iter().filter(|o| **o == wanted).count()
}
