//! Outbound transport layer.
//!
//! [`Transport`] is the capability seam between the dispatcher, the janitor,
//! and the actual HTTP machinery: the dispatcher only needs `submit`, the
//! janitor only needs `close_idle_older_than`. Both receive the transport as
//! an explicit dependency rather than reaching into shared base state.

mod http;
mod pool;

pub use http::HttpTransport;
pub use pool::{ClientLease, ConnectionPool, PoolStats};

use crate::error::DispatchError;
use crate::request::ShardRequest;
use std::time::Duration;

/// Outbound request transport with a sweepable connection pool.
pub trait Transport: Send + Sync {
    /// Hand one shard request to the transport.
    ///
    /// Must not block beyond enqueueing the work; the outcome is delivered
    /// on the request's reply channel.
    fn submit(&self, request: ShardRequest);

    /// Close pooled connections idle for at least `max_idle`.
    ///
    /// Returns how many were closed. Connections serving an in-flight
    /// request are never closed.
    fn close_idle_older_than(&self, max_idle: Duration) -> Result<usize, DispatchError>;
}
