//! Request handler module
//!
//! Route dispatch plus the two service endpoints: time-and-IP and liveness.

pub mod health;
pub mod router;
pub mod time;

use thiserror::Error;

// Re-export main entry point
pub use router::handle_request;

/// Internal fault while building a handler response
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build response: {0}")]
    Build(#[from] hyper::http::Error),
}
