//! HTTP transport for shard requests.

use crate::error::DispatchError;
use crate::metrics;
use crate::request::{ShardParams, ShardRequest, ShardResponse};
use crate::transport::pool::{ClientLease, ConnectionPool};
use crate::transport::Transport;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Transport that executes shard requests over pooled HTTP connections.
pub struct HttpTransport {
    pool: Arc<ConnectionPool>,
}

impl HttpTransport {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl Transport for HttpTransport {
    fn submit(&self, request: ShardRequest) {
        let ShardRequest {
            request_id,
            shard,
            endpoint,
            params,
            reply,
        } = request;

        let lease = match self.pool.checkout(&endpoint) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(%request_id, shard, endpoint, error = %e, "Failed to check out pooled client");
                metrics::record_shard_error(&shard, e.error_type_label());
                // The requester still hears about the failure; never drop silently.
                let _ = reply.send(Err(e));
                return;
            }
        };

        tokio::spawn(async move {
            let started = Instant::now();
            let result = execute(lease, &shard, &endpoint, &params).await;

            match &result {
                Ok(response) => {
                    metrics::record_shard_response(&shard, started.elapsed());
                    debug!(
                        %request_id,
                        shard,
                        status = response.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Shard response received"
                    );
                }
                Err(e) => {
                    metrics::record_shard_error(&shard, e.error_type_label());
                    warn!(%request_id, shard, endpoint, error = %e, "Shard request failed");
                }
            }

            if reply.send(result).is_err() {
                debug!(%request_id, shard, "Requester dropped the reply channel");
            }
        });
    }

    fn close_idle_older_than(&self, max_idle: Duration) -> Result<usize, DispatchError> {
        Ok(self.pool.close_idle_older_than(max_idle))
    }
}

/// Run one shard request to completion on a checked-out client.
///
/// The lease is held across the whole exchange so the sweep cannot close
/// the connection mid-request.
async fn execute(
    lease: ClientLease,
    shard: &str,
    endpoint: &str,
    params: &ShardParams,
) -> Result<ShardResponse, DispatchError> {
    let response = lease
        .client
        .get(endpoint)
        .query(params.as_pairs())
        .send()
        .await
        .map_err(|source| DispatchError::Request {
            shard: shard.to_string(),
            source,
        })?;

    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|source| DispatchError::Request {
            shard: shard.to_string(),
            source,
        })?
        .to_vec();

    Ok(ShardResponse {
        shard: shard.to_string(),
        status,
        body,
    })
}
