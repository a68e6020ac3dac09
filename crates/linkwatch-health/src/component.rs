//! The lifecycle contract of a network-gated component.

/// Something the watchdog starts when the network is healthy and stops
/// when it is not.
///
/// Implementations keep their own state; the watchdog only reads
/// `is_started` and calls `start`/`stop` to reach the target state.
/// Calls arrive from the watchdog task, so implementations must be
/// cheap to call and must not block for long.
pub trait Component: Send + Sync {
    /// Name used in logs and cycle reports.
    fn name(&self) -> &str;

    fn is_started(&self) -> bool;

    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self) -> anyhow::Result<()>;
}
