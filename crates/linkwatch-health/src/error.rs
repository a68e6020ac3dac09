//! Watchdog error types.

use thiserror::Error;

/// Errors raised while building a watchdog or parsing its targets.
///
/// Probe and component lifecycle failures never show up here: probes
/// collapse to "not reachable" and lifecycle errors are logged.
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("invalid network interface name: {0:?}")]
    InvalidInterfaceName(String),

    #[error("check period must be greater than zero")]
    InvalidPeriod,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls setup error: {0}")]
    Tls(String),
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;
