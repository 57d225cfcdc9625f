//! Per-endpoint HTTP connection pool.
//!
//! One pooled client per shard endpoint. Evicting an entry drops its client,
//! which closes the idle sockets it holds; a client serving an in-flight
//! request stays alive through the lease clone until the request completes.

use crate::config::PoolConfig;
use crate::error::DispatchError;
use crate::metrics;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct PoolEntry {
    client: Client,
    last_used: Instant,
    in_flight: Arc<AtomicUsize>,
}

/// A checked-out client.
///
/// Holding the lease pins the entry's in-flight count; the janitor skips
/// entries with in-flight requests, so the connection cannot be closed
/// underneath the request. Dropping the lease releases the pin.
pub struct ClientLease {
    pub client: Client,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pool counters for readiness reporting
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub endpoints_open: usize,
    pub in_flight: usize,
    pub created_total: u64,
    pub evictions_total: u64,
    pub stale_rebuilds_total: u64,
}

/// Shared registry of pooled HTTP clients, keyed by endpoint URL.
pub struct ConnectionPool {
    config: PoolConfig,
    endpoints: DashMap<String, PoolEntry>,
    created: AtomicU64,
    evictions: AtomicU64,
    stale_rebuilds: AtomicU64,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            endpoints: DashMap::new(),
            created: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            stale_rebuilds: AtomicU64::new(0),
        }
    }

    /// Check a client out for one request against `endpoint`.
    ///
    /// Creates the pooled client on first use. With the stale-connection
    /// check enabled, an entry that has sat idle past the idle timeout is
    /// rebuilt instead of reused.
    pub fn checkout(&self, endpoint: &str) -> Result<ClientLease, DispatchError> {
        let now = Instant::now();

        match self.endpoints.entry(endpoint.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if self.config.stale_connection_check
                    && now.duration_since(entry.last_used) >= self.config.idle_timeout
                {
                    debug!(endpoint, "rebuilding idle-stale pooled client");
                    entry.client = self.build_client(endpoint)?;
                    self.stale_rebuilds.fetch_add(1, Ordering::Relaxed);
                    metrics::record_stale_rebuild();
                }
                entry.last_used = now;
                entry.in_flight.fetch_add(1, Ordering::SeqCst);
                Ok(ClientLease {
                    client: entry.client.clone(),
                    in_flight: Arc::clone(&entry.in_flight),
                })
            }
            Entry::Vacant(vacant) => {
                let client = self.build_client(endpoint)?;
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint, "opened pooled client");

                let in_flight = Arc::new(AtomicUsize::new(1));
                vacant.insert(PoolEntry {
                    client: client.clone(),
                    last_used: now,
                    in_flight: Arc::clone(&in_flight),
                });
                Ok(ClientLease { client, in_flight })
            }
        }
    }

    /// Evict entries idle for at least `max_idle`, returning the count.
    ///
    /// Entries with in-flight requests are kept regardless of idle age.
    pub fn close_idle_older_than(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0usize;

        self.endpoints.retain(|endpoint, entry| {
            if entry.in_flight.load(Ordering::SeqCst) > 0 {
                return true;
            }
            let idle_for = now.duration_since(entry.last_used);
            if idle_for < max_idle {
                return true;
            }
            debug!(
                endpoint,
                idle_secs = idle_for.as_secs(),
                "evicting idle pooled client"
            );
            evicted += 1;
            false
        });

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            endpoints_open: self.endpoints.len(),
            in_flight: self
                .endpoints
                .iter()
                .map(|e| e.in_flight.load(Ordering::SeqCst))
                .sum(),
            created_total: self.created.load(Ordering::Relaxed),
            evictions_total: self.evictions.load(Ordering::Relaxed),
            stale_rebuilds_total: self.stale_rebuilds.load(Ordering::Relaxed),
        }
    }

    fn build_client(&self, endpoint: &str) -> Result<Client, DispatchError> {
        Client::builder()
            .tcp_nodelay(self.config.tcp_nodelay)
            // reqwest's own per-client reaping; the janitor drops whole
            // clients on the same threshold for entries nothing pins.
            .pool_idle_timeout(Some(self.config.idle_timeout))
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|source| DispatchError::ClientBuild {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}
