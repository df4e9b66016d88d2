//! # lfs-fetchd
//!
//! Local daemon that pulls Git LFS attachments on demand for note-taking
//! clients.
//!
//! A client that renders a note finds attachments that are still LFS pointer
//! files and asks the daemon to fetch them. The daemon runs one
//! `git lfs pull --include <list>` per request inside the working tree,
//! watches the client connection while the tool runs, and answers with one
//! outcome code per resource: `0` updated, `1` unchanged, `2` failed.
//!
//! ## Dispatch modes
//!
//! - **Batched** (default) - every request gets its own supervised pull. A
//!   client that disconnects early has its pull terminated.
//! - **Queued** (legacy) - requests are answered at once and a single
//!   background worker pulls queued resources one by one. A newer request
//!   supersedes whatever the worker has not reached yet.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lfs_fetchd::{Config, LfsFetcher, run_with_shutdown};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         working_dir: "/home/me/notes".into(),
//!         ..Default::default()
//!     };
//!     config.validate()?;
//!
//!     let fetcher = Arc::new(LfsFetcher::new(config));
//!
//!     // Subscribe to events
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Serve until SIGINT/SIGTERM
//!     run_with_shutdown(fetcher).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::sync::Arc;

/// HTTP API module
pub mod api;
/// Per-resource outcome classification
pub mod classifier;
/// Configuration types
pub mod config;
/// Request dispatch (batched and queued modes)
pub mod dispatcher;
/// Error types
pub mod error;
/// Pull tool execution
pub mod executor;
/// Generation-tagged work queue for queued mode
pub mod supersession;
/// Core types and events
pub mod types;
/// Client disconnection detection
pub mod watcher;

// Re-export commonly used types
pub use config::{ClientKind, Config, CorsConfig, DispatchMode, LfsConfig, ServerConfig};
pub use dispatcher::{FetchOutcome, LfsFetcher};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use executor::{FetchExecutor, FetchOperation, OperationState};
pub use types::{Event, FetchRequest, ResourceOutcome, ResourceState};
pub use watcher::{DisconnectProbe, NeverDisconnects, PeerConnection};

/// Serve the configured address until a termination signal arrives.
///
/// Binds the listener first so address errors surface immediately, starts
/// the queue worker in queued mode, then serves. On SIGTERM or SIGINT the
/// fetcher is shut down (terminating running pulls) and the server drains.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use lfs_fetchd::{Config, LfsFetcher, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fetcher = Arc::new(LfsFetcher::new(Config::default()));
///     run_with_shutdown(fetcher).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(fetcher: Arc<LfsFetcher>) -> Result<()> {
    let address = fetcher.config().server.socket_addr();
    let listener = api::PeerListener::bind(address).await?;
    tracing::info!(
        %address,
        mode = fetcher.mode().as_str(),
        working_dir = %fetcher.config().working_dir.display(),
        "lfs-fetchd listening"
    );

    let worker = fetcher.start_queue_worker();

    let signalled = Arc::clone(&fetcher);
    let shutdown = async move {
        wait_for_signal().await;
        signalled.shutdown();
    };
    api::serve(Arc::clone(&fetcher), listener, shutdown).await?;

    if let Some(worker) = worker
        && let Err(e) = worker.await
    {
        tracing::error!(error = %e, "queue worker panicked");
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
