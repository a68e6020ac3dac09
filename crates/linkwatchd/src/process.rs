//! Child processes as network-gated components.

use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use linkwatch_health::Component;

use crate::config::ComponentConfig;

/// Runs a configured command while the network is healthy.
///
/// `start` spawns the command, `stop` kills it. A process that exits on
/// its own counts as stopped and is spawned again on the next healthy
/// cycle.
pub struct ProcessComponent {
    spec: ComponentConfig,
    child: Mutex<Option<Child>>,
}

impl ProcessComponent {
    pub fn new(spec: ComponentConfig) -> Self {
        Self {
            spec,
            child: Mutex::new(None),
        }
    }

    /// PID of the running process.
    pub fn pid(&self) -> Option<u32> {
        self.lock().as_ref().and_then(Child::id)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Component for ProcessComponent {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn is_started(&self) -> bool {
        let mut guard = self.lock();
        let Some(child) = guard.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(component = %self.spec.name, %status, "component process exited");
                *guard = None;
                false
            }
            Err(e) => {
                warn!(component = %self.spec.name, error = %e, "failed to poll component process");
                true
            }
        }
    }

    fn start(&self) -> anyhow::Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }

        let child = Command::new(&self.spec.command)
            .args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.spec.command))?;

        info!(component = %self.spec.name, pid = ?child.id(), "component process spawned");
        *guard = Some(child);
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        let mut guard = self.lock();
        let Some(mut child) = guard.take() else {
            return Ok(());
        };

        if let Err(e) = child.start_kill() {
            // Keep the handle so the next cycle can retry.
            *guard = Some(child);
            return Err(e).with_context(|| format!("failed to kill {}", self.spec.name));
        }

        info!(component = %self.spec.name, "component process killed");
        Ok(())
    }
}
