//! Core data types for the Drishti reachability analyzer
//!
//! Tasks and results flow through the pipeline by value; everything here is
//! cheap to clone and carries public fields so the hot evaluation loop does
//! not pay accessor overhead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::DrishtiError;

use ipnet::IpNet;

/// Supported L4 protocols. All port checks are scoped to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = DrishtiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(DrishtiError::InvalidProtocol(other.to_string())),
        }
    }
}

/// Policy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Accept,
    Deny,
}

impl Action {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict for a single flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    MatchPolicyAccept,
    MatchPolicyDeny,
    ImplicitDeny,
}

impl Reason {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Reason::MatchPolicyAccept => "MATCH_POLICY_ACCEPT",
            Reason::MatchPolicyDeny => "MATCH_POLICY_DENY",
            Reason::ImplicitDeny => "IMPLICIT_DENY",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One port/protocol entry from the traffic input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub label: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl PortEntry {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(label: S, port: u16, protocol: Protocol) -> Self {
        Self {
            label: label.into(),
            port,
            protocol,
        }
    }
}

/// A source network to sweep. `segment` keeps the input spelling for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNetwork {
    pub segment: String,
    pub network: IpNet,
}

impl SourceNetwork {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(segment: S, network: IpNet) -> Self {
        Self {
            segment: segment.into(),
            network,
        }
    }
}

/// A destination network plus the pass-through metadata attached to it.
///
/// The metadata map is opaque here; workers project the fixed keys
/// `dst_gn`, `dst_site`, and `dst_location` into result columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRecord {
    pub segment: String,
    pub network: IpNet,
    pub metadata: HashMap<String, String>,
}

impl DestinationRecord {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(segment: S, network: IpNet) -> Self {
        Self {
            segment: segment.into(),
            network,
            metadata: HashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Metadata keys recognized on destination records.
pub const META_DST_GN: &str = "dst_gn";
pub const META_DST_SITE: &str = "dst_site";
pub const META_DST_LOCATION: &str = "dst_location";

/// One evaluation request: a concrete (src IP, dst IP, port, protocol) flow
/// plus the labels that pass through into the result untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub src_ip: IpAddr,
    pub src_segment: String,
    pub dst_ip: IpAddr,
    pub dst_segment: String,
    pub dst_metadata: HashMap<String, String>,
    pub port: u16,
    pub protocol: Protocol,
    pub service_label: String,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} {}/{}",
            self.src_ip,
            self.dst_ip,
            self.protocol.as_str(),
            self.port
        )
    }
}

/// Fixed header shared by both output sinks.
pub const CSV_HEADER: &str = "src_network_segment,dst_network_segment,dst_gn,dst_site,dst_location,service_label,protocol,port,decision,matched_policy_id,matched_policy_action,reason";

/// The outcome of evaluating one task, ready for the result sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub src_segment: String,
    pub dst_segment: String,
    pub dst_gn: String,
    pub dst_site: String,
    pub dst_location: String,
    pub service_label: String,
    pub protocol: Protocol,
    pub port: u16,
    pub decision: Decision,
    pub matched_policy_id: String,
    pub matched_policy_action: String,
    pub reason: Reason,
}

impl SimulationResult {
    #[inline]
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }

    /// Render one CSV row matching [`CSV_HEADER`].
    #[must_use]
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&self.src_segment),
            csv_field(&self.dst_segment),
            csv_field(&self.dst_gn),
            csv_field(&self.dst_site),
            csv_field(&self.dst_location),
            csv_field(&self.service_label),
            self.protocol.as_str(),
            self.port,
            self.decision.as_str(),
            csv_field(&self.matched_policy_id),
            csv_field(&self.matched_policy_action),
            self.reason.as_str()
        )
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
#[must_use]
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// How the producer turns a CIDR into concrete addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpansionMode {
    /// One task per CIDR using its network address.
    Sample,
    /// Enumerate every address when the CIDR is small enough.
    Expand,
}

impl ExpansionMode {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExpansionMode::Sample => "sample",
            ExpansionMode::Expand => "expand",
        }
    }
}

impl fmt::Display for ExpansionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpansionMode {
    type Err = DrishtiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" => Ok(ExpansionMode::Sample),
            "expand" => Ok(ExpansionMode::Expand),
            other => Err(DrishtiError::Config(format!(
                "unknown expansion mode '{other}'"
            ))),
        }
    }
}

/// Simulation tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub mode: ExpansionMode,
    /// Host-count threshold above which a CIDR is sampled even in expand mode.
    pub max_hosts: u64,
    /// Number of parallel evaluation workers.
    pub workers: usize,
    /// Advisory task-count ceiling; 0 disables the check.
    pub max_tasks: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            mode: ExpansionMode::Sample,
            max_hosts: 65_536,
            workers: num_cpus::get(),
            max_tasks: 0,
        }
    }
}

impl SimulationOptions {
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: ExpansionMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_hosts(mut self, max_hosts: u64) -> Self {
        self.max_hosts = max_hosts;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_tasks(mut self, max_tasks: u64) -> Self {
        self.max_tasks = max_tasks;
        self
    }
}

/// Summary of one completed simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub tasks_emitted: u64,
    pub results_written: u64,
    pub allowed: u64,
    pub denied: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Fraction of written results that were allowed, in [0.0, 100.0].
    #[inline]
    #[must_use]
    pub fn allow_rate(&self) -> f64 {
        if self.results_written == 0 {
            0.0
        } else {
            (self.allowed as f64 / self.results_written as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn protocol_round_trip() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("icmp".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Tcp.as_str(), "tcp");
    }

    #[test]
    fn expansion_mode_parsing() {
        assert_eq!(
            "expand".parse::<ExpansionMode>().unwrap(),
            ExpansionMode::Expand
        );
        assert_eq!(
            " Sample ".parse::<ExpansionMode>().unwrap(),
            ExpansionMode::Sample
        );
        assert!("both".parse::<ExpansionMode>().is_err());
    }

    #[test]
    fn csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn result_row_matches_header() {
        let result = SimulationResult {
            src_segment: "10.0.0.0/24".to_string(),
            dst_segment: "192.168.1.0/24".to_string(),
            dst_gn: "gn-1".to_string(),
            dst_site: "site-a".to_string(),
            dst_location: "dc, east".to_string(),
            service_label: "HTTPS".to_string(),
            protocol: Protocol::Tcp,
            port: 443,
            decision: Decision::Allow,
            matched_policy_id: "100".to_string(),
            matched_policy_action: "accept".to_string(),
            reason: Reason::MatchPolicyAccept,
        };

        let row = result.to_csv_row();
        // quoted location field counts as one column
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count() + 1);
        assert!(row.contains("\"dc, east\""));
        assert!(row.ends_with("MATCH_POLICY_ACCEPT"));
        assert!(result.is_allowed());
    }

    #[test]
    fn options_builders() {
        let opts = SimulationOptions::default()
            .with_mode(ExpansionMode::Expand)
            .with_max_hosts(256)
            .with_workers(0)
            .with_max_tasks(1_000);
        assert_eq!(opts.mode, ExpansionMode::Expand);
        assert_eq!(opts.max_hosts, 256);
        // worker count is clamped to at least one
        assert_eq!(opts.workers, 1);
        assert_eq!(opts.max_tasks, 1_000);
    }

    #[test]
    fn task_display() {
        let task = Task {
            src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            src_segment: "10.0.0.0/24".to_string(),
            dst_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            dst_segment: "192.168.1.0/24".to_string(),
            dst_metadata: HashMap::new(),
            port: 443,
            protocol: Protocol::Tcp,
            service_label: "HTTPS".to_string(),
        };
        assert_eq!(task.to_string(), "10.0.0.1 -> 192.168.1.1 tcp/443");
    }
}
