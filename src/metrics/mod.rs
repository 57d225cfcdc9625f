//! Prometheus metrics module
//!
//! The recorder is installed once at startup; components record through the
//! free functions below, which route to the global recorder. Only rendering
//! needs the handle.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Dispatch metrics exporter
#[derive(Clone)]
pub struct DispatchMetrics {
    handle: Arc<PrometheusHandle>,
}

impl DispatchMetrics {
    /// Install the Prometheus recorder and return the render handle
    pub fn new() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        Self::register_metrics();

        Self {
            handle: Arc::new(handle),
        }
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "dispatch_requests_total",
            Unit::Count,
            "Shard requests accepted by the dispatcher"
        );
        describe_counter!(
            "dispatch_rewrite_failures_total",
            Unit::Count,
            "Parameter rewrites that failed and fell back to the original set"
        );
        describe_counter!(
            "transport_responses_total",
            Unit::Count,
            "Shard responses delivered by the transport"
        );
        describe_counter!(
            "transport_errors_total",
            Unit::Count,
            "Shard requests that failed at the transport level"
        );
        describe_counter!(
            "pool_sweeps_total",
            Unit::Count,
            "Idle-connection sweeps executed"
        );
        describe_counter!(
            "pool_sweep_failures_total",
            Unit::Count,
            "Idle-connection sweeps that failed"
        );
        describe_counter!(
            "pool_evictions_total",
            Unit::Count,
            "Pooled connections evicted for idleness"
        );
        describe_counter!(
            "pool_stale_rebuilds_total",
            Unit::Count,
            "Pooled clients rebuilt by the stale-connection check"
        );

        describe_histogram!(
            "transport_request_duration_seconds",
            Unit::Seconds,
            "Wall time of one shard request"
        );

        describe_gauge!(
            "pool_endpoints_open",
            Unit::Count,
            "Endpoints with a pooled connection currently open"
        );
        describe_gauge!(
            "janitor_running",
            Unit::Count,
            "Janitor worker status (1=running, 0=stopped)"
        );
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a request accepted by the dispatcher
pub fn record_dispatch(shard: &str) {
    counter!("dispatch_requests_total", "shard" => shard.to_string()).increment(1);
}

/// Record a parameter rewrite that fell back to the original set
pub fn record_rewrite_failure(shard: &str) {
    counter!("dispatch_rewrite_failures_total", "shard" => shard.to_string()).increment(1);
}

/// Record a shard response delivered on the reply channel
pub fn record_shard_response(shard: &str, duration: Duration) {
    counter!("transport_responses_total", "shard" => shard.to_string()).increment(1);

    histogram!(
        "transport_request_duration_seconds",
        "shard" => shard.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a transport-level failure
pub fn record_shard_error(shard: &str, error_type: &'static str) {
    counter!(
        "transport_errors_total",
        "shard" => shard.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Record one completed sweep and how many connections it evicted
pub fn record_sweep(evicted: usize) {
    counter!("pool_sweeps_total").increment(1);
    if evicted > 0 {
        counter!("pool_evictions_total").increment(evicted as u64);
    }
}

/// Record a failed sweep
pub fn record_sweep_failure() {
    counter!("pool_sweep_failures_total").increment(1);
}

/// Record a client rebuilt by the stale-connection check
pub fn record_stale_rebuild() {
    counter!("pool_stale_rebuilds_total").increment(1);
}

/// Set the open-endpoints gauge
pub fn set_pool_endpoints(open: usize) {
    gauge!("pool_endpoints_open").set(open as f64);
}

/// Set the janitor status gauge
pub fn set_janitor_running(running: bool) {
    gauge!("janitor_running").set(if running { 1.0 } else { 0.0 });
}
