//! HTTP API server module
//!
//! Serves the fetch endpoints used by note-taking clients plus a few system
//! endpoints. Connections are accepted through [`PeerListener`] so handlers
//! can tell when a client leaves mid-pull.

use crate::{LfsFetcher, Result};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod cors;
pub mod error_response;
pub mod listener;
pub mod openapi;
pub mod routes;
pub mod state;

pub use listener::{ClientConnection, PeerListener};
pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Fetch (CORS headers chosen by `User-Agent`)
/// - `POST /pull-lfs` - Pull resources
/// - `OPTIONS /pull-lfs` - Preflight
/// - `POST /status-lfs` - Report resource state
/// - `OPTIONS /status-lfs` - Preflight
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /events` - Server-sent events stream
pub fn create_router(fetcher: Arc<LfsFetcher>) -> Router {
    let state = AppState::new(fetcher);
    let cors = Arc::new(state.config.cors.clone());

    let fetch_routes = Router::new()
        .route(
            "/pull-lfs",
            post(routes::pull_lfs).options(routes::preflight),
        )
        .route(
            "/status-lfs",
            post(routes::status_lfs).options(routes::preflight),
        )
        .layer(middleware::from_fn_with_state(cors, cors::apply_cors));

    Router::new()
        .merge(fetch_routes)
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on an already bound listener until `shutdown` resolves
///
/// In-flight pulls are cancelled through the fetcher's shutdown token, so
/// `shutdown` should fire after [`LfsFetcher::shutdown`] for a prompt exit.
pub async fn serve<F>(fetcher: Arc<LfsFetcher>, listener: PeerListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(fetcher);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<ClientConnection>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

/// Start the API server on the configured bind address.
///
/// Binds the listener and serves the API until the fetcher is shut down.
///
/// # Example
///
/// ```no_run
/// use lfs_fetchd::{Config, LfsFetcher};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Arc::new(LfsFetcher::new(Config::default()));
///
/// // Start API server (blocks until shutdown)
/// lfs_fetchd::api::start_api_server(fetcher).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(fetcher: Arc<LfsFetcher>) -> Result<()> {
    let bind_address = fetcher.config().server.socket_addr();

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = PeerListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    let shutdown = fetcher.shutdown_token();
    serve(fetcher, listener, async move { shutdown.cancelled_owned().await }).await
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
