//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the lfs-fetchd HTTP API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the lfs-fetchd HTTP API
///
/// Served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "lfs-fetchd HTTP API",
        version = "0.1.0",
        description = "Local daemon pulling Git LFS attachments on demand for note-taking clients",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://127.0.0.1:3322", description = "Default local listener")
    ),
    paths(
        // Fetch
        crate::api::routes::pull_lfs,
        crate::api::routes::status_lfs,
        crate::api::routes::preflight,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(
        schemas(
            crate::types::FetchRequest,
            crate::types::ResourceState,
            crate::types::Event,
            crate::api::routes::QueuedResponse,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "fetch", description = "Pulling attachments and reporting their state"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_fetch_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/pull-lfs"));
        assert!(doc.paths.paths.contains_key("/status-lfs"));
        assert!(doc.paths.paths.contains_key("/health"));

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["components"]["schemas"]["FetchRequest"].is_object());
    }
}
