//! Task producer
//!
//! Walks the cross product in deterministic order: source CIDR, source host,
//! destination CIDR, destination host, port entry. Closes the task channel
//! by dropping the sender when the product is exhausted or the stop signal
//! flips.

use std::net::IpAddr;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use drishti_common::net::successor;
use drishti_common::types::{
    DestinationRecord, PortEntry, SimulationOptions, SourceNetwork, Task,
};
use ipnet::IpNet;

use crate::estimator::axis_host_count;

pub struct Producer {
    sources: Vec<SourceNetwork>,
    destinations: Vec<DestinationRecord>,
    ports: Vec<PortEntry>,
    options: SimulationOptions,
}

impl Producer {
    #[must_use]
    pub fn new(
        sources: Vec<SourceNetwork>,
        destinations: Vec<DestinationRecord>,
        ports: Vec<PortEntry>,
        options: SimulationOptions,
    ) -> Self {
        Self {
            sources,
            destinations,
            ports,
            options,
        }
    }

    /// Emit every task to the channel. Returns the number emitted; stops
    /// early when the stop signal flips or the channel closes underneath us
    /// (writer failure).
    pub async fn run(self, tasks: mpsc::Sender<Task>, stop: watch::Receiver<bool>) -> u64 {
        // destination host lists are reused across every source host
        let destination_hosts: Vec<(&DestinationRecord, Vec<IpAddr>)> = self
            .destinations
            .iter()
            .map(|record| (record, axis_addresses(&record.network, &self.options)))
            .collect();

        let mut emitted = 0u64;
        'product: for source in &self.sources {
            let source_hosts = axis_addresses(&source.network, &self.options);
            debug!(segment = %source.segment, hosts = source_hosts.len(), "producing source axis");
            for src_ip in &source_hosts {
                for (destination, dst_hosts) in &destination_hosts {
                    for dst_ip in dst_hosts {
                        for entry in &self.ports {
                            if *stop.borrow() {
                                info!(emitted, "producer stopped by cancellation");
                                break 'product;
                            }
                            let task = Task {
                                src_ip: *src_ip,
                                src_segment: source.segment.clone(),
                                dst_ip: *dst_ip,
                                dst_segment: destination.segment.clone(),
                                dst_metadata: destination.metadata.clone(),
                                port: entry.port,
                                protocol: entry.protocol,
                                service_label: entry.label.clone(),
                            };
                            if tasks.send(task).await.is_err() {
                                info!(emitted, "task channel closed, producer stopping");
                                break 'product;
                            }
                            emitted += 1;
                        }
                    }
                }
            }
        }

        info!(emitted, "producer finished");
        emitted
    }
}

/// Concrete addresses one CIDR contributes, mirroring the estimator: the
/// network address alone, or the full enumeration in expand mode.
#[must_use]
pub fn axis_addresses(net: &IpNet, options: &SimulationOptions) -> Vec<IpAddr> {
    let count = axis_host_count(net, options);
    if count == 1 {
        return vec![net.network()];
    }

    let mut addresses = Vec::with_capacity(count as usize);
    let mut current = net.network();
    for _ in 0..count {
        addresses.push(current);
        current = successor(&current);
    }
    addresses
}
