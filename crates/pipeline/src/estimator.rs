//! Task estimator
//!
//! Mirrors the producer's mode/threshold rules exactly so the progress
//! reporter can display trustworthy percentages. `axis_host_count` is the
//! single source of truth for how many addresses one CIDR contributes; the
//! producer derives its expansion decision from the same function.

use ipnet::IpNet;
use tracing::warn;

use drishti_common::net::cidr_size;
use drishti_common::types::{
    DestinationRecord, ExpansionMode, PortEntry, SimulationOptions, SourceNetwork,
};

/// Number of addresses one CIDR contributes under the given options.
///
/// In expand mode a CIDR with `1 < size <= max_hosts` is enumerated in
/// full; everything else is represented by its network address alone.
#[must_use]
pub fn axis_host_count(net: &IpNet, options: &SimulationOptions) -> u128 {
    let size = cidr_size(net);
    match options.mode {
        ExpansionMode::Expand if size > 1 && size <= u128::from(options.max_hosts) => size,
        _ => 1,
    }
}

/// Expected task count for the full cross product.
#[must_use]
pub fn estimate_tasks(
    sources: &[SourceNetwork],
    destinations: &[DestinationRecord],
    ports: &[PortEntry],
    options: &SimulationOptions,
) -> u128 {
    let src_hosts: u128 = sources
        .iter()
        .map(|source| axis_host_count(&source.network, options))
        .sum();
    let dst_hosts: u128 = destinations
        .iter()
        .map(|destination| axis_host_count(&destination.network, options))
        .sum();

    src_hosts
        .saturating_mul(dst_hosts)
        .saturating_mul(ports.len() as u128)
}

/// Warn (but do not abort) when the estimate exceeds the advisory task
/// ceiling. A `max_tasks` of 0 disables the check.
pub fn check_task_budget(estimate: u128, options: &SimulationOptions) {
    if options.max_tasks > 0 && estimate > u128::from(options.max_tasks) {
        warn!(
            estimate,
            max_tasks = options.max_tasks,
            "estimated task count exceeds the configured ceiling"
        );
    }
}
