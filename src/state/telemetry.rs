use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Network statistics aggregated for one host
///
/// Sets only grow and the response time only accumulates; an entry is created on the
/// first successful response from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTelemetry {
    pub host: String,
    pub remote_addrs: BTreeSet<String>,
    pub dns_addrs: BTreeSet<String>,
    pub visited_paths: BTreeSet<String>,
    pub total_response_time_ms: u64,
}

impl HostTelemetry {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// Average response time per visited path, never dividing by zero
    pub fn average_response_ms(&self) -> u64 {
        self.total_response_time_ms / (self.visited_paths.len().max(1) as u64)
    }

    fn merge(&mut self, observation: &Observation<'_>) {
        if let Some(remote_addr) = observation.remote_addr {
            self.remote_addrs.insert(remote_addr.to_string());
        }
        self.dns_addrs
            .extend(observation.dns_addrs.iter().map(|addr| addr.to_string()));
        self.visited_paths.insert(observation.path.to_string());
        self.total_response_time_ms += observation.response_time_ms;
    }
}

/// One response's worth of network metadata
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Peer address of the connection that served the response, when known
    pub remote_addr: Option<&'a str>,
    pub dns_addrs: &'a [String],
    pub path: &'a str,
    pub response_time_ms: u64,
}

/// Serializable view of a host's telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub paths: Vec<String>,
    pub remote_addrs: Vec<String>,
    pub dns_addrs: Vec<String>,
    pub avg_response_ms: u64,
}

impl From<&HostTelemetry> for HostSummary {
    fn from(telemetry: &HostTelemetry) -> Self {
        // BTreeSet iteration is already sorted
        Self {
            paths: telemetry.visited_paths.iter().cloned().collect(),
            remote_addrs: telemetry.remote_addrs.iter().cloned().collect(),
            dns_addrs: telemetry.dns_addrs.iter().cloned().collect(),
            avg_response_ms: telemetry.average_response_ms(),
        }
    }
}

/// Concurrent-safe aggregation of per-host network statistics
///
/// Each update runs under the lock of the host's map shard, so concurrent
/// observations of the same host never lose a merge.
#[derive(Debug, Default)]
pub struct HostTelemetryStore {
    hosts: DashMap<String, HostTelemetry>,
}

impl HostTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one response's metadata into the entry for `host`, creating it if needed
    pub fn observe(&self, host: &str, observation: Observation<'_>) {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| HostTelemetry::new(host))
            .merge(&observation);
    }

    /// Returns a copy of the telemetry for `host`
    pub fn get(&self, host: &str) -> Option<HostTelemetry> {
        self.hosts.get(host).map(|entry| entry.value().clone())
    }

    /// Average response time for `host`, computed on demand
    pub fn average_response_ms(&self, host: &str) -> Option<u64> {
        self.hosts
            .get(host)
            .map(|entry| entry.value().average_response_ms())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Sorted summaries of every host, for reporting after the run
    pub fn summaries(&self) -> BTreeMap<String, HostSummary> {
        self.hosts
            .iter()
            .map(|entry| (entry.key().clone(), HostSummary::from(entry.value())))
            .collect()
    }
}
