//! Fetch handlers: pull, status, preflight.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::listener::ClientConnection;
use crate::classifier;
use crate::config::DispatchMode;
use crate::dispatcher::FetchOutcome;
use crate::error::{Error, Result};
use crate::types::{FetchRequest, ResourceState};
use crate::watcher::{DisconnectProbe, NeverDisconnects};

/// Largest request body accepted on the fetch routes
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Response of `POST /pull-lfs` in queued mode
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueuedResponse {
    /// Generation of the queue that now holds the resources
    pub generation: u64,
    /// Number of resources queued
    pub queued: usize,
}

/// POST /pull-lfs - Pull resources into the working tree
///
/// In batched mode the response is held until the pull tool exits and
/// carries one outcome code per resource, in request order: `0` updated,
/// `1` unchanged, `2` failed. If the client disconnects first the tool is
/// terminated and no response is written (the handler yields a 500 that the
/// closed socket never carries).
#[utoipa::path(
    post,
    path = "/pull-lfs",
    tag = "fetch",
    request_body = FetchRequest,
    responses(
        (status = 200, description = "Pull succeeded; outcome code per resource", body = Vec<u8>),
        (status = 202, description = "Resources queued (queued mode)", body = QueuedResponse),
        (status = 400, description = "Malformed request body", body = crate::error::ApiError),
        (status = 500, description = "Pull tool failed (all codes 2) or could not be started", body = Vec<u8>),
        (status = 503, description = "Daemon is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn pull_lfs(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (connection, fetch) = decode_request(request).await?;
    if fetch.resources.is_empty() {
        return Err(Error::MalformedRequest(
            "resources must not be empty".to_string(),
        ));
    }

    if state.fetcher.mode() == DispatchMode::Queued {
        let queued = fetch.resources.len();
        let generation = state.fetcher.enqueue(&fetch)?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(QueuedResponse { generation, queued }),
        )
            .into_response());
    }

    let probe: Arc<dyn DisconnectProbe> = match connection {
        Some(connection) => {
            tracing::debug!(peer = %connection.remote_addr, note = %fetch.note, "pull requested");
            Arc::new(connection.peer)
        }
        None => Arc::new(NeverDisconnects),
    };

    let outcome = state.fetcher.fetch_supervised(fetch, probe).await?;
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    match outcome {
        FetchOutcome::Completed { outcomes, .. } => Ok((status, Json(outcomes)).into_response()),
        FetchOutcome::Abandoned if state.fetcher.shutdown_token().is_cancelled() => {
            Err(Error::ShuttingDown)
        }
        // Nobody is listening; hyper discards this once it sees the closed socket.
        FetchOutcome::Abandoned => Err(Error::ApiServerError(
            "client abandoned the request".to_string(),
        )),
    }
}

/// POST /status-lfs - Report what is on disk for each resource
#[utoipa::path(
    post,
    path = "/status-lfs",
    tag = "fetch",
    request_body = FetchRequest,
    responses(
        (status = 200, description = "State of each resource, keyed by path", body = BTreeMap<String, ResourceState>),
        (status = 400, description = "Malformed request body", body = crate::error::ApiError)
    )
)]
pub async fn status_lfs(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (_, fetch) = decode_request(request).await?;

    let statuses: BTreeMap<String, ResourceState> = fetch
        .resources
        .into_iter()
        .map(|resource| {
            let status = classifier::resource_status(&state.config.working_dir, &resource);
            (resource, status)
        })
        .collect();

    Ok(Json(statuses).into_response())
}

/// OPTIONS /pull-lfs, /status-lfs - CORS preflight
///
/// Answered without a body; the CORS layer adds the headers.
#[utoipa::path(
    options,
    path = "/pull-lfs",
    tag = "fetch",
    responses(
        (status = 204, description = "Preflight accepted")
    )
)]
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Split a request into its connection info (when served through
/// [`PeerListener`](crate::api::listener::PeerListener)) and decoded body
async fn decode_request(request: Request) -> Result<(Option<ClientConnection>, FetchRequest)> {
    let connection = request
        .extensions()
        .get::<ConnectInfo<ClientConnection>>()
        .map(|ConnectInfo(connection)| connection.clone());

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| Error::MalformedRequest(format!("failed to read body: {e}")))?;
    let fetch: FetchRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::MalformedRequest(format!("invalid request body: {e}")))?;

    Ok((connection, fetch))
}
