//! Dispatch configuration module
//!
//! Handles loading configuration from environment variables and validating
//! the coupling between the local idle timeout and the upstream server's
//! idle-socket timeout.

use crate::error::DispatchError;
use std::env;
use std::time::Duration;

/// Immutable pool configuration snapshot.
///
/// Captured once at startup and handed to the transport and the janitor;
/// read-only afterward.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle age at which the janitor evicts a pooled connection.
    ///
    /// OPERATIONAL COUPLING: this value must be strictly lower than the
    /// shard servers' own idle-socket timeout (commonly 50 seconds on
    /// Jetty-style deployments), otherwise the peer closes the socket first
    /// and requests race against half-closed connections. Set
    /// `UPSTREAM_IDLE_TIMEOUT_SECS` to have startup enforce this.
    pub idle_timeout: Duration,

    /// How often the janitor sweeps the pool.
    pub sweep_interval: Duration,

    /// Disable Nagle's algorithm on outbound sockets.
    pub tcp_nodelay: bool,

    /// Rebuild a pooled client at checkout when its entry has sat idle
    /// past `idle_timeout`. Off by default to keep checkout latency flat.
    pub stale_connection_check: bool,

    /// Whole-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(40),
            sweep_interval: Duration::from_secs(5),
            tcp_nodelay: true,
            stale_connection_check: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Dispatch process configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Connection pool settings
    pub pool: PoolConfig,

    /// The upstream servers' idle-socket timeout, when known.
    /// Used only to validate `pool.idle_timeout` at startup.
    pub upstream_idle_timeout: Option<Duration>,

    /// Health/ops HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl DispatchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, DispatchError> {
        dotenvy::dotenv().ok();

        let idle_timeout = env_duration_secs("SHARD_IDLE_TIMEOUT_SECS", 40)?;
        let sweep_interval = env_duration_secs("SWEEP_INTERVAL_SECS", 5)?;
        let request_timeout = env_duration_secs("REQUEST_TIMEOUT_SECS", 30)?;
        let tcp_nodelay = env_bool("TCP_NODELAY", true)?;
        let stale_connection_check = env_bool("STALE_CONNECTION_CHECK", false)?;

        let upstream_idle_timeout = match env::var("UPSTREAM_IDLE_TIMEOUT_SECS") {
            Ok(raw) => Some(parse_secs("UPSTREAM_IDLE_TIMEOUT_SECS", &raw)?),
            Err(_) => None,
        };

        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse()
            .map_err(|e| {
                DispatchError::Config(format!("HTTP_PORT must be a valid port number: {e}"))
            })?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let config = Self {
            pool: PoolConfig {
                idle_timeout,
                sweep_interval,
                tcp_nodelay,
                stale_connection_check,
                request_timeout,
            },
            upstream_idle_timeout,
            http_port,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// The idle timeout must be strictly lower than the upstream servers'
    /// idle-socket timeout when the latter is configured; otherwise the
    /// peer wins the close race.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.pool.sweep_interval < Duration::from_secs(1) {
            return Err(DispatchError::Config(
                "SWEEP_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if self.pool.idle_timeout.is_zero() {
            return Err(DispatchError::Config(
                "SHARD_IDLE_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if let Some(upstream) = self.upstream_idle_timeout {
            if self.pool.idle_timeout >= upstream {
                return Err(DispatchError::Config(format!(
                    "SHARD_IDLE_TIMEOUT_SECS ({}) must be strictly lower than \
                     UPSTREAM_IDLE_TIMEOUT_SECS ({}) so the local janitor closes \
                     idle sockets before the upstream server does",
                    self.pool.idle_timeout.as_secs(),
                    upstream.as_secs()
                )));
            }
        }
        Ok(())
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration, DispatchError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| DispatchError::Config(format!("{name} must be a valid number of seconds: {e}")))
}

fn env_duration_secs(name: &str, default_secs: u64) -> Result<Duration, DispatchError> {
    match env::var(name) {
        Ok(raw) => parse_secs(name, &raw),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, DispatchError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<bool>()
            .map_err(|e| DispatchError::Config(format!("{name} must be 'true' or 'false': {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(idle_secs: u64, upstream_secs: Option<u64>) -> DispatchConfig {
        DispatchConfig {
            pool: PoolConfig {
                idle_timeout: Duration::from_secs(idle_secs),
                ..PoolConfig::default()
            },
            upstream_idle_timeout: upstream_secs.map(Duration::from_secs),
            http_port: 9090,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn default_pool_config_matches_deployment_baseline() {
        let pool = PoolConfig::default();
        assert_eq!(pool.idle_timeout, Duration::from_secs(40));
        assert_eq!(pool.sweep_interval, Duration::from_secs(5));
        assert!(pool.tcp_nodelay);
        assert!(!pool.stale_connection_check);
    }

    #[test]
    fn idle_timeout_must_undercut_upstream() {
        // 40 < 50: the janitor closes before the upstream server does
        assert!(config_with(40, Some(50)).validate().is_ok());

        // Equal or higher loses the close race
        assert!(config_with(50, Some(50)).validate().is_err());
        assert!(config_with(60, Some(50)).validate().is_err());
    }

    #[test]
    fn unknown_upstream_timeout_is_not_validated() {
        assert!(config_with(120, None).validate().is_ok());
    }

    #[test]
    fn sub_second_sweep_interval_rejected() {
        let mut config = config_with(40, None);
        config.pool.sweep_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}
