//! Shard request dispatcher.

use crate::dispatch::rewrite::rewrite_for_shard;
use crate::metrics;
use crate::request::ShardRequest;
use crate::transport::Transport;

use std::sync::Arc;
use tracing::{debug, warn};

/// Decorator over a [`Transport`] that rewrites parameters per shard before
/// delegating.
///
/// Holds no mutable state; `submit` is safe to call concurrently from any
/// number of fan-out tasks. The transport's completion mechanism (the
/// request's reply channel) passes through untouched.
pub struct ShardRequestDispatcher {
    transport: Arc<dyn Transport>,
}

impl ShardRequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Rewrite the request's parameters for its shard and forward it.
    ///
    /// A rewrite that cannot be applied forwards the ORIGINAL parameter set
    /// with a warning; the request is never dropped silently.
    pub fn submit(&self, request: ShardRequest) {
        let ShardRequest {
            request_id,
            shard,
            endpoint,
            params,
            reply,
        } = request;

        let forwarded = match rewrite_for_shard(&shard, &params) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!(
                    %request_id,
                    shard,
                    error = %e,
                    "Parameter rewrite failed; forwarding original parameters"
                );
                metrics::record_rewrite_failure(&shard);
                params
            }
        };

        debug!(%request_id, shard, params = %forwarded, "Dispatching shard request");
        metrics::record_dispatch(&shard);

        self.transport.submit(ShardRequest {
            request_id,
            shard,
            endpoint,
            params: forwarded,
            reply,
        });
    }
}
