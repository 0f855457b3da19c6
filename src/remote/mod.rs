//! Remote TaskFlow service access.

pub mod api_types;
pub mod client;
pub mod gateway;
pub mod retry;

pub use client::{HttpMethod, HttpTransport, RemoteRequest, Transport};
pub use gateway::{RemoteGateway, ServiceInfo};
pub use retry::RetryPolicy;
