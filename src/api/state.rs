//! Application state for the API server

use crate::{Config, LfsFetcher};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the fetcher and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The fetcher serving pull requests
    pub fetcher: Arc<LfsFetcher>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(fetcher: Arc<LfsFetcher>) -> Self {
        let config = Arc::clone(fetcher.config());
        Self { fetcher, config }
    }
}
