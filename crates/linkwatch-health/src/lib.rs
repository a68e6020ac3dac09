//! linkwatch-health — network reachability watchdog.
//!
//! Probes a set of addresses and HTTP endpoints on a fixed period and
//! starts or stops dependent components depending on whether the
//! network can be reached.
//!
//! # Architecture
//!
//! ```text
//! NetworkHealthCheck
//!   ├── Mutex<WatchLists>
//!   │   ├── addresses  (IpAddr, TCP echo probe)
//!   │   ├── endpoints  (Uri, HTTP GET probe)
//!   │   └── components (Arc<dyn Component>)
//!   ├── Box<dyn Prober> (NetworkProber: interface + timeouts + TLS)
//!   └── Schedule → run_periodically() → run() per tick
//! ```
//!
//! # Health policy
//!
//! The network is healthy when any single target answers. Healthy
//! cycles start every stopped component, unhealthy cycles stop every
//! started one. With no targets configured, cycles are no-ops.
//!
//! Probe failures are expected and never surface as errors. Component
//! failures are logged and collected in the [`CycleReport`] without
//! interrupting the sweep.

pub mod component;
pub mod config;
pub mod error;
pub mod interface;
pub mod probe;
pub mod schedule;
pub mod targets;
pub mod watchdog;

pub use component::Component;
pub use config::{WatchdogConfig, parse_duration};
pub use error::{WatchdogError, WatchdogResult};
pub use interface::NetworkInterface;
pub use probe::{NetworkProber, Prober};
pub use schedule::Schedule;
pub use watchdog::{ComponentFailure, CycleReport, NetworkHealthCheck, Transition};
