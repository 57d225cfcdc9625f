//! Meridian dispatch layer.
//!
//! Fan-out of per-shard HTTP search requests over a pooled transport:
//! - [`dispatch::ShardRequestDispatcher`] rewrites parameters per shard
//!   before delegating to the transport
//! - [`janitor::PoolJanitor`] keeps the connection pool free of sockets
//!   idle past the configured threshold
//!
//! Shard selection, result merging, and fault tolerance belong to the host
//! query-execution layer, not this crate.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod janitor;
pub mod metrics;
pub mod request;
pub mod transport;
