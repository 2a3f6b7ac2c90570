//! Traffic input parsers
//!
//! Three small loaders feed the pipeline:
//! - source networks: one CIDR (or bare IP) per line
//! - destinations: CSV with a mandatory `Network Segment` column and
//!   optional `GN` / `Site` / `Location` metadata columns
//! - ports: CSV rows `label,port,protocol`
//!
//! Per-row problems are recovered by skipping the row with a warning;
//! unreadable files and a missing mandatory column are fatal.

use anyhow::{bail, Context, Result};
use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;
use tracing::warn;

use drishti_common::error::DrishtiError;
use drishti_common::types::{
    DestinationRecord, PortEntry, Protocol, SourceNetwork, META_DST_GN, META_DST_LOCATION,
    META_DST_SITE,
};

/// Column that must be present in the destination CSV header.
pub const NETWORK_SEGMENT_COLUMN: &str = "Network Segment";

/// Optional metadata columns, mapped to their fixed result keys.
const META_COLUMNS: &[(&str, &str)] = &[
    ("GN", META_DST_GN),
    ("Site", META_DST_SITE),
    ("Location", META_DST_LOCATION),
];

/// Parse a CIDR token, accepting a bare IP as a host network.
fn parse_network(token: &str) -> Option<IpNet> {
    if let Ok(net) = token.parse::<IpNet>() {
        return Some(net);
    }
    token.parse::<IpAddr>().ok().map(IpNet::from)
}

/// Parse source networks from text: one token per line, `#` comments and
/// blank lines ignored.
pub fn parse_source_networks(text: &str) -> Vec<SourceNetwork> {
    let mut sources = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        match parse_network(token) {
            Some(network) => sources.push(SourceNetwork::new(token, network)),
            None => warn!(line = line_no + 1, token, "skipping unparseable source network"),
        }
    }
    sources
}

/// Load source networks from a file.
pub async fn load_source_networks(path: &Path) -> Result<Vec<SourceNetwork>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read source networks from {}", path.display()))?;
    let sources = parse_source_networks(&text);
    if sources.is_empty() {
        bail!("no valid source networks in {}", path.display());
    }
    Ok(sources)
}

/// Split one CSV line on commas, trimming whitespace and simple quotes.
fn split_csv(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_string())
        .collect()
}

/// Parse destination records from CSV text. The header must contain the
/// `Network Segment` column; metadata columns are optional.
pub fn parse_destinations(text: &str) -> Result<Vec<DestinationRecord>> {
    let mut lines = text.lines();
    let header = lines.next().context("destination CSV is empty")?;
    let columns = split_csv(header);

    let segment_idx = columns
        .iter()
        .position(|column| column.eq_ignore_ascii_case(NETWORK_SEGMENT_COLUMN))
        .ok_or_else(|| DrishtiError::MissingColumn(NETWORK_SEGMENT_COLUMN.to_string()))?;

    let meta_indices: Vec<(usize, &str)> = META_COLUMNS
        .iter()
        .filter_map(|(column, key)| {
            columns
                .iter()
                .position(|candidate| candidate.eq_ignore_ascii_case(column))
                .map(|idx| (idx, *key))
        })
        .collect();

    let mut records = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv(line);
        let Some(segment) = fields.get(segment_idx).filter(|s| !s.is_empty()) else {
            warn!(line = line_no + 2, "skipping destination row without a network segment");
            continue;
        };
        let Some(network) = parse_network(segment) else {
            warn!(
                line = line_no + 2,
                segment, "skipping destination row with unparseable network"
            );
            continue;
        };

        let mut record = DestinationRecord::new(segment.clone(), network);
        for (idx, key) in &meta_indices {
            if let Some(value) = fields.get(*idx).filter(|v| !v.is_empty()) {
                record.metadata.insert((*key).to_string(), value.clone());
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Load destination records from a file.
pub async fn load_destinations(path: &Path) -> Result<Vec<DestinationRecord>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read destinations from {}", path.display()))?;
    let records =
        parse_destinations(&text).with_context(|| format!("in {}", path.display()))?;
    if records.is_empty() {
        bail!("no valid destination records in {}", path.display());
    }
    Ok(records)
}

/// Parse port entries from CSV text: `label,port,protocol` per row.
/// A header row is tolerated (its port field does not parse).
pub fn parse_port_entries(text: &str) -> Vec<PortEntry> {
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let fields = split_csv(line);
        if fields.len() < 3 {
            warn!(line = line_no + 1, "skipping short port row");
            continue;
        }
        let port: u16 = match fields[1].parse() {
            Ok(port) if port >= 1 => port,
            _ => {
                warn!(line = line_no + 1, field = %fields[1], "skipping row with invalid port");
                continue;
            }
        };
        let protocol: Protocol = match fields[2].parse() {
            Ok(protocol) => protocol,
            Err(_) => {
                warn!(line = line_no + 1, field = %fields[2], "skipping row with invalid protocol");
                continue;
            }
        };
        entries.push(PortEntry::new(fields[0].clone(), port, protocol));
    }
    entries
}

/// Load port entries from a file.
pub async fn load_port_entries(path: &Path) -> Result<Vec<PortEntry>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read port entries from {}", path.display()))?;
    let entries = parse_port_entries(&text);
    if entries.is_empty() {
        bail!("no valid port entries in {}", path.display());
    }
    Ok(entries)
}
