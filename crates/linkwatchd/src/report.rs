//! Output of `linkwatchd check`.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub target: String,
    pub reachable: bool,
}

/// Per-target probe results plus the aggregate verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub addresses: Vec<TargetStatus>,
    pub endpoints: Vec<TargetStatus>,
    pub healthy: bool,
}

impl CheckReport {
    pub fn record_address(&mut self, address: IpAddr, reachable: bool) {
        self.addresses.push(TargetStatus {
            target: address.to_string(),
            reachable,
        });
        self.healthy |= reachable;
    }

    pub fn record_endpoint(&mut self, endpoint: &impl fmt::Display, reachable: bool) {
        self.endpoints.push(TargetStatus {
            target: endpoint.to_string(),
            reachable,
        });
        self.healthy |= reachable;
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for status in self.addresses.iter().chain(&self.endpoints) {
            let mark = if status.reachable { "ok" } else { "unreachable" };
            writeln!(f, "{:<48} {mark}", status.target)?;
        }
        let verdict = if self.healthy { "healthy" } else { "unhealthy" };
        writeln!(f, "network is {verdict}")
    }
}
