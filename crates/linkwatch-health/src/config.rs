//! Construction parameters for the network health check.

use std::time::Duration;

use crate::schedule::Schedule;

/// Address probe timeout used when `timeout_ms` is zero.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport timeout for endpoint probes.
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings fixed for the lifetime of one watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Outbound interface for address probes. `None` lets the OS route.
    pub interface: Option<String>,
    /// Time between two evaluation cycles.
    pub period: Duration,
    /// Address probe timeout in milliseconds; `0` selects the default.
    pub timeout_ms: u64,
    /// Upper bound for a whole endpoint probe; zero selects the default.
    pub endpoint_timeout: Duration,
    /// Wait one period before the first cycle.
    pub initial_delay: bool,
}

impl WatchdogConfig {
    /// Config with the given period and defaults for everything else.
    pub fn new(period: Duration) -> Self {
        Self {
            interface: None,
            period,
            timeout_ms: 0,
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
            initial_delay: false,
        }
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: bool) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Effective address probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        if self.timeout_ms == 0 {
            DEFAULT_PROBE_TIMEOUT
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }

    /// Effective endpoint transport timeout; zero selects the default.
    pub fn endpoint_probe_timeout(&self) -> Duration {
        if self.endpoint_timeout.is_zero() {
            DEFAULT_ENDPOINT_TIMEOUT
        } else {
            self.endpoint_timeout
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            period: self.period,
            initial_delay: self.initial_delay,
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.trim().parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.trim().parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
