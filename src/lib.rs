//! Resilient data access for the TaskFlow task manager.
//!
//! Reads and writes go to the TaskFlow service through a deduplicating,
//! retrying gateway, and fall back to a local key/value store whenever the
//! user is not signed in remotely or the service fails.

pub mod cache;
pub mod config;
pub mod error;
pub mod local;
pub mod logging;
pub mod remote;
pub mod result;
pub mod store;
pub mod types;

pub use error::{GatewayError, StoreError};
pub use result::ApiResult;
