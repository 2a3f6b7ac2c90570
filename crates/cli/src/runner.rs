//! Runner glue: load inputs and policies, build the evaluator, drive the
//! pipeline or the precheck report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use drishti_common::types::{
    DestinationRecord, ExpansionMode, PortEntry, SimulationOptions, SourceNetwork,
};
use drishti_evaluator::Evaluator;
use drishti_fortigate::FortigateProvider;
use drishti_inputs::{load_destinations, load_port_entries, load_source_networks};
use drishti_pipeline::{run_pipeline, PipelineConfig};
use drishti_policy::{flatten, PolicyProvider};

#[allow(clippy::too_many_arguments)]
pub async fn run_simulation(
    config: PathBuf,
    sources: PathBuf,
    destinations: PathBuf,
    ports: PathBuf,
    mode: String,
    max_hosts: u64,
    workers: Option<usize>,
    max_tasks: u64,
    out_total: PathBuf,
    out_accepted: PathBuf,
) -> Result<()> {
    let mode: ExpansionMode = mode.parse()?;
    let mut options = SimulationOptions::default()
        .with_mode(mode)
        .with_max_hosts(max_hosts)
        .with_max_tasks(max_tasks);
    if let Some(workers) = workers {
        options = options.with_workers(workers);
    }

    info!("Starting simulation...");
    info!("Policy source: {}", config.display());
    info!("Mode: {} (max hosts {})", options.mode, options.max_hosts);
    info!("Workers: {}", options.workers);

    let (evaluator, sources, destinations, ports) =
        load_stage(&config, &sources, &destinations, &ports).await?;

    let summary = run_pipeline(
        evaluator,
        sources,
        destinations,
        ports,
        PipelineConfig {
            options,
            total_path: out_total,
            accepted_path: out_accepted,
        },
    )
    .await?;

    info!(
        "Run {} finished: {} results, {} allowed ({:.1}%), {} denied",
        summary.run_id,
        summary.results_written,
        summary.allowed,
        summary.allow_rate(),
        summary.denied
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct PrecheckRow {
    src_network_segment: String,
    dst_network_segment: String,
    service_label: String,
    protocol: String,
    port: u16,
    outcome: String,
    policy_id: String,
    reason: String,
}

pub async fn run_precheck(
    config: PathBuf,
    sources: PathBuf,
    destinations: PathBuf,
    ports: PathBuf,
    format: String,
) -> Result<()> {
    let (evaluator, sources, destinations, ports) =
        load_stage(&config, &sources, &destinations, &ports).await?;

    let mut rows = Vec::new();
    for source in &sources {
        for destination in &destinations {
            for entry in &ports {
                let verdict = evaluator.precheck(
                    &source.network,
                    &destination.network,
                    entry.port,
                    entry.protocol,
                );
                rows.push(PrecheckRow {
                    src_network_segment: source.segment.clone(),
                    dst_network_segment: destination.segment.clone(),
                    service_label: entry.label.clone(),
                    protocol: entry.protocol.as_str().to_string(),
                    port: entry.port,
                    outcome: verdict.outcome.as_str().to_string(),
                    policy_id: verdict.policy_id.unwrap_or_default(),
                    reason: verdict.reason.as_str().to_string(),
                });
            }
        }
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            println!(
                "src_network_segment,dst_network_segment,service_label,protocol,port,outcome,policy_id,reason"
            );
            for row in rows {
                println!(
                    "{},{},{},{},{},{},{},{}",
                    drishti_common::types::csv_field(&row.src_network_segment),
                    drishti_common::types::csv_field(&row.dst_network_segment),
                    drishti_common::types::csv_field(&row.service_label),
                    row.protocol,
                    row.port,
                    row.outcome,
                    drishti_common::types::csv_field(&row.policy_id),
                    row.reason
                );
            }
        }
    }
    Ok(())
}

/// Load the traffic inputs and the policy set, flatten it, and build the
/// shared evaluator. Everything here is fatal before the pipeline starts.
async fn load_stage(
    config: &Path,
    sources: &Path,
    destinations: &Path,
    ports: &Path,
) -> Result<(
    Arc<Evaluator>,
    Vec<SourceNetwork>,
    Vec<DestinationRecord>,
    Vec<PortEntry>,
)> {
    let source_networks = load_source_networks(sources).await?;
    let destination_records = load_destinations(destinations).await?;
    let port_entries = load_port_entries(ports).await?;
    info!(
        "Loaded {} source network(s), {} destination(s), {} port entries",
        source_networks.len(),
        destination_records.len(),
        port_entries.len()
    );

    let provider = FortigateProvider::new(config);
    let policy_set = provider
        .load()
        .await
        .with_context(|| format!("loading policies via {}", provider.name()))?;
    let policies = flatten(policy_set).context("flattening policy groups")?;
    let evaluator = Arc::new(Evaluator::new(policies));
    info!("Policy table ready: {} policie(s)", evaluator.len());

    Ok((
        evaluator,
        source_networks,
        destination_records,
        port_entries,
    ))
}
