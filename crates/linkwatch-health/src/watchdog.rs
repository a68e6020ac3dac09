//! Network health check — gates components on aggregate reachability.
//!
//! `NetworkHealthCheck` owns the address and endpoint watch-lists plus
//! the registered components. Each cycle it probes the targets and, if
//! any one of them answers, starts every stopped component; if none
//! answers, it stops every started component.
//!
//! A single mutex guards all three collections and is held for the
//! whole of every mutation and every cycle, probe I/O included.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use http::Uri;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::component::Component;
use crate::config::WatchdogConfig;
use crate::error::{WatchdogError, WatchdogResult};
use crate::probe::{NetworkProber, Prober};
use crate::schedule::Schedule;
use crate::targets;

/// Lifecycle call issued to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
}

/// A component whose `start` or `stop` failed during a cycle.
#[derive(Debug)]
pub struct ComponentFailure {
    pub component: String,
    pub transition: Transition,
    pub error: anyhow::Error,
}

/// What one call to [`NetworkHealthCheck::run`] did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Aggregate verdict, `None` when no targets were configured.
    pub healthy: Option<bool>,
    /// Components started this cycle.
    pub started: Vec<String>,
    /// Components stopped this cycle.
    pub stopped: Vec<String>,
    pub failures: Vec<ComponentFailure>,
}

impl CycleReport {
    /// True when the cycle had no targets and left components alone.
    pub fn skipped(&self) -> bool {
        self.healthy.is_none()
    }
}

/// State behind the exclusion lock.
#[derive(Default)]
struct WatchLists {
    addresses: HashSet<IpAddr>,
    endpoints: HashSet<Uri>,
    /// Duplicate-free by `Arc` identity.
    components: Vec<Arc<dyn Component>>,
    /// Verdict of the previous cycle, for transition logging.
    last_verdict: Option<bool>,
}

/// Periodic reachability watchdog.
///
/// Share it as `Arc<NetworkHealthCheck>`: the owner mutates the
/// watch-lists while the scheduler task calls [`run`](Self::run).
pub struct NetworkHealthCheck {
    prober: Box<dyn Prober>,
    schedule: Schedule,
    lists: Mutex<WatchLists>,
}

impl NetworkHealthCheck {
    /// Build a watchdog that probes the real network.
    ///
    /// Fails if the period is zero or the interface cannot be resolved.
    pub fn new(config: WatchdogConfig) -> WatchdogResult<Self> {
        let prober = NetworkProber::new(&config)?;
        if let Some(nic) = prober.interface() {
            debug!(interface = %nic.name(), index = nic.index(), "probe interface resolved");
        }
        Self::with_prober(config.schedule(), prober)
    }

    /// Build a watchdog around a custom prober.
    pub fn with_prober(schedule: Schedule, prober: impl Prober + 'static) -> WatchdogResult<Self> {
        if schedule.period.is_zero() {
            return Err(WatchdogError::InvalidPeriod);
        }
        Ok(Self {
            prober: Box::new(prober),
            schedule,
            lists: Mutex::new(WatchLists::default()),
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    // ── Components ─────────────────────────────────────────────

    /// Register a component. Adding the same handle twice is a no-op.
    pub async fn add_component(&self, component: Arc<dyn Component>) {
        let mut lists = self.lists.lock().await;
        if lists.components.iter().any(|c| Arc::ptr_eq(c, &component)) {
            return;
        }
        debug!(component = %component.name(), "component registered");
        lists.components.push(component);
    }

    pub async fn clear_components(&self) {
        self.lists.lock().await.components.clear();
    }

    pub async fn component_count(&self) -> usize {
        self.lists.lock().await.components.len()
    }

    // ── Addresses ──────────────────────────────────────────────

    /// Start watching an address.
    ///
    /// The address is probed once right away; an unreachable address is
    /// reported but still added.
    pub async fn add_address(&self, address: IpAddr) {
        let mut lists = self.lists.lock().await;
        if !self.prober.probe_address(address).await {
            warn!(%address, "ping address wasn't reachable when added");
        }
        lists.addresses.insert(address);
    }

    /// Add every address of a comma-separated list of IPs or host names.
    ///
    /// The whole list is resolved before anything is added.
    pub async fn add_address_list(&self, list: &str) -> WatchdogResult<()> {
        for address in targets::resolve_address_list(list).await? {
            self.add_address(address).await;
        }
        Ok(())
    }

    pub async fn remove_address(&self, address: IpAddr) {
        let mut lists = self.lists.lock().await;
        if lists.addresses.remove(&address) {
            debug!(%address, "ping address removed");
        }
    }

    pub async fn clear_addresses(&self) {
        self.lists.lock().await.addresses.clear();
    }

    pub async fn addresses(&self) -> Vec<IpAddr> {
        self.lists.lock().await.addresses.iter().copied().collect()
    }

    // ── Endpoints ──────────────────────────────────────────────

    /// Start watching an endpoint. Same advisory probe as `add_address`.
    pub async fn add_endpoint(&self, endpoint: Uri) {
        let mut lists = self.lists.lock().await;
        if !self.prober.probe_endpoint(&endpoint).await {
            warn!(%endpoint, "ping url wasn't reachable when added");
        }
        lists.endpoints.insert(endpoint);
    }

    /// Add every URL of a comma-separated list.
    ///
    /// The whole list is parsed before anything is added.
    pub async fn add_endpoint_list(&self, list: &str) -> WatchdogResult<()> {
        for endpoint in targets::parse_endpoint_list(list)? {
            self.add_endpoint(endpoint).await;
        }
        Ok(())
    }

    pub async fn remove_endpoint(&self, endpoint: &Uri) {
        let mut lists = self.lists.lock().await;
        if lists.endpoints.remove(endpoint) {
            debug!(%endpoint, "ping url removed");
        }
    }

    pub async fn clear_endpoints(&self) {
        self.lists.lock().await.endpoints.clear();
    }

    pub async fn endpoints(&self) -> Vec<Uri> {
        self.lists.lock().await.endpoints.iter().cloned().collect()
    }

    // ── Probing ────────────────────────────────────────────────

    /// Probe a single address, outside the watch-list.
    pub async fn check_address(&self, address: IpAddr) -> bool {
        self.prober.probe_address(address).await
    }

    /// Probe a single endpoint, outside the watch-list.
    pub async fn check_endpoint(&self, endpoint: &Uri) -> bool {
        self.prober.probe_endpoint(endpoint).await
    }

    /// Aggregate health: true as soon as any watched target answers.
    ///
    /// Addresses are tried before endpoints. With nothing to watch
    /// there is no evidence of connectivity and the answer is false.
    pub async fn check(&self) -> bool {
        let lists = self.lists.lock().await;
        self.evaluate(&lists).await
    }

    async fn evaluate(&self, lists: &WatchLists) -> bool {
        for &address in &lists.addresses {
            if self.prober.probe_address(address).await {
                return true;
            }
        }
        for endpoint in &lists.endpoints {
            if self.prober.probe_endpoint(endpoint).await {
                return true;
            }
        }
        false
    }

    // ── Cycle ──────────────────────────────────────────────────

    /// Run one evaluation cycle.
    ///
    /// Without targets nothing happens. Otherwise components are moved
    /// towards the aggregate verdict; a failing component is logged and
    /// the sweep continues with the next one.
    pub async fn run(&self) -> CycleReport {
        let mut lists = self.lists.lock().await;
        let mut report = CycleReport::default();

        if lists.addresses.is_empty() && lists.endpoints.is_empty() {
            return report;
        }

        let healthy = self.evaluate(&lists).await;
        report.healthy = Some(healthy);

        if lists.last_verdict != Some(healthy) {
            if healthy {
                info!("network is healthy");
            } else {
                info!("network is unhealthy");
            }
            lists.last_verdict = Some(healthy);
        }

        for component in &lists.components {
            let name = component.name();
            let transition = match (healthy, component.is_started()) {
                (true, false) => Transition::Start,
                (false, true) => Transition::Stop,
                _ => continue,
            };

            let result = match transition {
                Transition::Start => {
                    info!(component = %name, "network is healthy, starting component");
                    component.start()
                }
                Transition::Stop => {
                    info!(component = %name, "network is unhealthy, stopping component");
                    component.stop()
                }
            };

            match (result, transition) {
                (Ok(()), Transition::Start) => report.started.push(name.to_string()),
                (Ok(()), Transition::Stop) => report.stopped.push(name.to_string()),
                (Err(error), _) => {
                    warn!(component = %name, ?transition, error = %error, "component transition failed");
                    report.failures.push(ComponentFailure {
                        component: name.to_string(),
                        transition,
                        error,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::bail;

    use crate::probe::ProbeFuture;

    /// Prober whose answers are set by the test.
    #[derive(Clone, Default)]
    struct FakeNetwork {
        up: Arc<StdMutex<HashSet<String>>>,
        probes: Arc<AtomicUsize>,
    }

    impl FakeNetwork {
        fn set_up(&self, target: &str, up: bool) {
            let mut set = self.up.lock().unwrap();
            if up {
                set.insert(target.to_string());
            } else {
                set.remove(target);
            }
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        fn answer(&self, target: String) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.up.lock().unwrap().contains(&target)
        }
    }

    impl Prober for FakeNetwork {
        fn probe_address(&self, address: IpAddr) -> ProbeFuture<'_> {
            let ok = self.answer(address.to_string());
            Box::pin(async move { ok })
        }

        fn probe_endpoint<'a>(&'a self, endpoint: &'a Uri) -> ProbeFuture<'a> {
            let ok = self.answer(endpoint.to_string());
            Box::pin(async move { ok })
        }
    }

    struct FakeComponent {
        name: String,
        running: AtomicBool,
        fail: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl FakeComponent {
        fn new(name: &str, running: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                running: AtomicBool::new(running),
                fail: false,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str, running: bool) -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Arc::into_inner(Self::new(name, running)).unwrap()
            })
        }

        fn calls(&self) -> usize {
            self.starts.load(Ordering::SeqCst) + self.stops.load(Ordering::SeqCst)
        }
    }

    impl Component for FakeComponent {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_started(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn start(&self) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("{} refused to start", self.name);
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("{} refused to stop", self.name);
            }
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            period: Duration::from_secs(1),
            initial_delay: false,
        }
    }

    fn watchdog(network: &FakeNetwork) -> NetworkHealthCheck {
        NetworkHealthCheck::with_prober(schedule(), network.clone()).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn zero_period_is_rejected() {
        let schedule = Schedule {
            period: Duration::ZERO,
            initial_delay: false,
        };
        let result = NetworkHealthCheck::with_prober(schedule, FakeNetwork::default());
        assert!(matches!(result, Err(WatchdogError::InvalidPeriod)));
    }

    #[tokio::test]
    async fn check_with_no_targets_is_unhealthy() {
        let network = FakeNetwork::default();
        assert!(!watchdog(&network).check().await);
    }

    #[tokio::test]
    async fn check_all_unreachable_is_unhealthy() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_address(ip("10.0.0.2")).await;
        wd.add_endpoint(uri("http://10.0.0.3/")).await;
        assert!(!wd.check().await);
    }

    #[tokio::test]
    async fn check_single_reachable_target_is_healthy() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_address(ip("10.0.0.2")).await;
        wd.add_endpoint(uri("http://10.0.0.3/")).await;

        network.set_up("http://10.0.0.3/", true);
        assert!(wd.check().await);

        network.set_up("http://10.0.0.3/", false);
        network.set_up("10.0.0.2", true);
        assert!(wd.check().await);
    }

    #[tokio::test]
    async fn check_short_circuits_before_endpoints() {
        let network = FakeNetwork::default();
        network.set_up("10.0.0.1", true);
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_endpoint(uri("http://10.0.0.3/")).await;

        let before = network.probes();
        assert!(wd.check().await);
        assert_eq!(network.probes() - before, 1);
    }

    #[tokio::test]
    async fn unreachable_address_is_still_added() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.9.9.9")).await;
        wd.add_endpoint(uri("http://10.9.9.9/")).await;
        assert_eq!(wd.addresses().await, vec![ip("10.9.9.9")]);
        assert_eq!(wd.endpoints().await, vec![uri("http://10.9.9.9/")]);
    }

    #[tokio::test]
    async fn add_is_duplicate_free_and_remove_is_lenient() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_address(ip("10.0.0.1")).await;
        assert_eq!(wd.addresses().await.len(), 1);

        wd.remove_address(ip("10.0.0.2")).await;
        wd.remove_endpoint(&uri("http://nowhere/")).await;
        assert_eq!(wd.addresses().await.len(), 1);

        wd.remove_address(ip("10.0.0.1")).await;
        assert!(wd.addresses().await.is_empty());
    }

    #[tokio::test]
    async fn clear_empties_each_list() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_endpoint(uri("http://10.0.0.1/")).await;
        wd.add_component(FakeComponent::new("a", false)).await;

        wd.clear_addresses().await;
        assert!(wd.addresses().await.is_empty());
        assert_eq!(wd.endpoints().await.len(), 1);

        wd.clear_endpoints().await;
        assert!(wd.endpoints().await.is_empty());

        wd.clear_components().await;
        assert_eq!(wd.component_count().await, 0);
    }

    #[tokio::test]
    async fn same_component_handle_registers_once() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        let component = FakeComponent::new("acceptor", false);
        wd.add_component(component.clone()).await;
        wd.add_component(component.clone()).await;
        // A different handle with the same name is a different component.
        wd.add_component(FakeComponent::new("acceptor", false)).await;
        assert_eq!(wd.component_count().await, 2);
    }

    #[tokio::test]
    async fn run_without_targets_leaves_components_alone() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        let stopped = FakeComponent::new("stopped", false);
        let running = FakeComponent::new("running", true);
        wd.add_component(stopped.clone()).await;
        wd.add_component(running.clone()).await;

        let report = wd.run().await;
        assert!(report.skipped());
        assert_eq!(stopped.calls(), 0);
        assert_eq!(running.calls(), 0);
        assert_eq!(network.probes(), 0);
    }

    #[tokio::test]
    async fn healthy_cycle_starts_stopped_components() {
        let network = FakeNetwork::default();
        network.set_up("10.0.0.1", true);
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;

        let stopped = FakeComponent::new("stopped", false);
        let running = FakeComponent::new("running", true);
        wd.add_component(stopped.clone()).await;
        wd.add_component(running.clone()).await;

        let report = wd.run().await;
        assert_eq!(report.healthy, Some(true));
        assert_eq!(report.started, vec!["stopped".to_string()]);
        assert!(stopped.is_started());
        assert_eq!(running.calls(), 0);
    }

    #[tokio::test]
    async fn unhealthy_cycle_stops_started_components() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_endpoint(uri("http://10.0.0.1/")).await;

        let stopped = FakeComponent::new("stopped", false);
        let running = FakeComponent::new("running", true);
        wd.add_component(stopped.clone()).await;
        wd.add_component(running.clone()).await;

        let report = wd.run().await;
        assert_eq!(report.healthy, Some(false));
        assert_eq!(report.stopped, vec!["running".to_string()]);
        assert!(!running.is_started());
        assert_eq!(stopped.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_cycles_are_idempotent() {
        let network = FakeNetwork::default();
        network.set_up("10.0.0.1", true);
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        let component = FakeComponent::new("acceptor", false);
        wd.add_component(component.clone()).await;

        wd.run().await;
        assert_eq!(component.calls(), 1);

        let report = wd.run().await;
        assert!(report.started.is_empty());
        assert_eq!(component.calls(), 1);
    }

    #[tokio::test]
    async fn failing_component_does_not_block_the_sweep() {
        let network = FakeNetwork::default();
        network.set_up("10.0.0.1", true);
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;

        let first = FakeComponent::new("first", false);
        let second = FakeComponent::failing("second", false);
        let third = FakeComponent::new("third", false);
        wd.add_component(first.clone()).await;
        wd.add_component(second.clone()).await;
        wd.add_component(third.clone()).await;

        let report = wd.run().await;
        assert_eq!(first.starts.load(Ordering::SeqCst), 1);
        assert_eq!(second.starts.load(Ordering::SeqCst), 1);
        assert_eq!(third.starts.load(Ordering::SeqCst), 1);
        assert!(first.is_started());
        assert!(third.is_started());

        assert_eq!(report.started, vec!["first".to_string(), "third".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].component, "second");
        assert_eq!(report.failures[0].transition, Transition::Start);
    }

    #[tokio::test]
    async fn failing_stop_is_retried_next_cycle() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        let stubborn = FakeComponent::failing("stubborn", true);
        wd.add_component(stubborn.clone()).await;

        wd.run().await;
        wd.run().await;
        assert_eq!(stubborn.stops.load(Ordering::SeqCst), 2);
        assert!(stubborn.is_started());
    }

    #[tokio::test]
    async fn reachability_changes_drive_transitions() {
        let network = FakeNetwork::default();
        network.set_up("10.0.0.1", true);
        let wd = watchdog(&network);
        wd.add_address(ip("10.0.0.1")).await;
        wd.add_endpoint(uri("http://10.0.0.2/")).await;
        let component = FakeComponent::new("acceptor", false);
        wd.add_component(component.clone()).await;

        assert!(wd.check().await);
        wd.run().await;
        assert!(component.is_started());

        wd.remove_address(ip("10.0.0.1")).await;
        let report = wd.run().await;
        assert_eq!(report.healthy, Some(false));
        assert!(!component.is_started());
    }

    #[tokio::test]
    async fn address_list_adds_every_item() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        wd.add_address_list("10.0.0.1, 10.0.0.2,,").await.unwrap();
        let mut addresses = wd.addresses().await;
        addresses.sort();
        assert_eq!(addresses, vec![ip("10.0.0.1"), ip("10.0.0.2")]);
    }

    #[tokio::test]
    async fn bad_endpoint_list_adds_nothing() {
        let network = FakeNetwork::default();
        let wd = watchdog(&network);
        let err = wd
            .add_endpoint_list("http://10.0.0.1/, not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, WatchdogError::InvalidEndpoint { .. }));
        assert!(wd.endpoints().await.is_empty());
    }
}
