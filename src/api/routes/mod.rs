//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`fetch`] - Pulling resources and reporting their state
//! - [`system`] - Health, events, OpenAPI

mod fetch;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use fetch::*;
pub use system::*;
