//! CORS headers chosen by the caller's User-Agent
//!
//! The desktop app and the mobile app load notes from different origins, so
//! the allowed origin cannot be a fixed list: it is picked per request from
//! [`CorsConfig`] using the `User-Agent` header.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

use crate::config::CorsConfig;

/// Methods the fetch routes accept from cross-origin callers
const ALLOWED_METHODS: HeaderValue = HeaderValue::from_static("POST");

/// Any request header is accepted
const ALLOWED_HEADERS: HeaderValue = HeaderValue::from_static("*");

/// Middleware adding `Access-Control-Allow-*` headers to every response
///
/// Runs for preflight and actual requests alike.
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use lfs_fetchd::api::cors::apply_cors;
/// use lfs_fetchd::config::CorsConfig;
/// use std::sync::Arc;
///
/// let router: Router = Router::new()
///     .layer(middleware::from_fn_with_state(
///         Arc::new(CorsConfig::default()),
///         apply_cors,
///     ));
/// ```
pub async fn apply_cors(
    State(cors): State<Arc<CorsConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let mut response = next.run(request).await;

    let (kind, origin) = cors.resolve(&user_agent);
    let headers = response.headers_mut();
    match HeaderValue::from_str(origin) {
        Ok(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(e) => {
            tracing::warn!(
                ?kind,
                origin,
                error = %e,
                "configured CORS origin is not a valid header value"
            );
        }
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS);
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS);

    response
}
