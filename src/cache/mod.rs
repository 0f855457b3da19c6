//! In-memory caching and request coordination for the remote path.
//!
//! This module provides:
//! - A TTL cache with lazy expiry and an optional periodic sweep
//! - An in-flight tracker so concurrent identical requests share one result
//! - Stable dedup keys derived from endpoint + call options

pub mod janitor;
mod inflight;
mod key;
mod ttl;

pub use inflight::InFlightTracker;
pub use key::request_key;
pub use ttl::{CacheEntry, CacheStats, TtlCache};
