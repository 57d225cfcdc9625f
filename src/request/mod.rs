//! Shard request value objects.
//!
//! A [`ShardRequest`] describes one outbound query to one shard: the target
//! endpoint, the ordered parameter set, and the reply channel on which the
//! transport delivers the outcome.

mod params;

pub use params::ShardParams;

use crate::error::DispatchError;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outcome of one shard request, delivered on the request's reply channel.
pub type ShardReply = Result<ShardResponse, DispatchError>;

/// Raw response from one shard
#[derive(Debug, Clone)]
pub struct ShardResponse {
    pub shard: String,
    pub status: u16,
    pub body: Vec<u8>,
}

/// One outbound per-shard request.
///
/// Completion arrives asynchronously on `reply`; the transport owns that
/// mechanism and nothing upstream of it may alter it.
pub struct ShardRequest {
    /// Correlation ID carried through logs
    pub request_id: Uuid,
    /// Logical shard name (e.g. "shard3")
    pub shard: String,
    /// Base URL of the shard's search endpoint
    pub endpoint: String,
    /// Ordered query parameters
    pub params: ShardParams,
    /// Completion channel
    pub reply: oneshot::Sender<ShardReply>,
}

impl ShardRequest {
    /// Create a request with a fresh correlation ID
    pub fn new(
        shard: impl Into<String>,
        endpoint: impl Into<String>,
        params: ShardParams,
        reply: oneshot::Sender<ShardReply>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            shard: shard.into(),
            endpoint: endpoint.into(),
            params,
            reply,
        }
    }
}
