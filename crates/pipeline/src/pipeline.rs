//! Pipeline coordinator
//!
//! Wires the producer, worker pool, writer, and progress reporter together
//! over two bounded channels. The evaluator is built before anything spawns
//! and shared read-only; cancellation flows through a watch signal plus
//! natural channel closure.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use drishti_common::types::{
    DestinationRecord, PortEntry, RunSummary, SimulationOptions, SourceNetwork,
};
use drishti_evaluator::Evaluator;

use crate::estimator::{check_task_budget, estimate_tasks};
use crate::producer::Producer;
use crate::progress::spawn_progress;
use crate::worker::spawn_workers;
use crate::writer::ResultWriter;

/// Per-worker depth of the bounded task and result channels.
const CHANNEL_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub options: SimulationOptions,
    pub total_path: PathBuf,
    pub accepted_path: PathBuf,
}

/// Run the full simulation pipeline to completion.
pub async fn run_pipeline(
    evaluator: Arc<Evaluator>,
    sources: Vec<SourceNetwork>,
    destinations: Vec<DestinationRecord>,
    ports: Vec<PortEntry>,
    config: PipelineConfig,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let workers = config.options.workers.max(1);
    let capacity = workers.saturating_mul(CHANNEL_DEPTH).max(1);

    let estimate = estimate_tasks(&sources, &destinations, &ports, &config.options);
    check_task_budget(estimate, &config.options);
    info!(
        %run_id,
        workers,
        mode = config.options.mode.as_str(),
        estimate,
        "starting simulation pipeline"
    );

    let (task_tx, task_rx) = mpsc::channel(capacity);
    let (result_tx, result_rx) = mpsc::channel(capacity);
    let (stop_tx, stop_rx) = watch::channel(false);
    let counter = Arc::new(AtomicU64::new(0));

    let producer = Producer::new(sources, destinations, ports, config.options.clone());
    let producer_handle = tokio::spawn(producer.run(task_tx, stop_rx.clone()));

    let shared_tasks = Arc::new(Mutex::new(task_rx));
    let worker_handles = spawn_workers(workers, evaluator, shared_tasks, result_tx);

    let writer = ResultWriter::new(
        config.total_path.clone(),
        config.accepted_path.clone(),
        counter.clone(),
    );
    let writer_handle = tokio::spawn(writer.run(result_rx));

    let progress_handle = spawn_progress(counter, estimate, stop_rx);

    let tasks_emitted = producer_handle.await.context("producer task failed")?;

    let mut processed = 0u64;
    for handle in worker_handles {
        processed += handle.await.context("worker task failed")?;
    }

    let writer_result = writer_handle.await.context("writer task failed")?;
    // stop the progress reporter whether the writer succeeded or not
    let _ = stop_tx.send(true);
    progress_handle.await.context("progress task failed")?;

    let stats = writer_result?;
    if stats.written != tasks_emitted {
        warn!(
            emitted = tasks_emitted,
            written = stats.written,
            "result count does not match emitted task count"
        );
    }
    debug_assert_eq!(processed, stats.written);

    let summary = RunSummary {
        run_id,
        tasks_emitted,
        results_written: stats.written,
        allowed: stats.allowed,
        denied: stats.written - stats.allowed,
        elapsed: started.elapsed(),
    };
    info!(
        %run_id,
        tasks = summary.results_written,
        allowed = summary.allowed,
        denied = summary.denied,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "simulation pipeline complete"
    );
    Ok(summary)
}
