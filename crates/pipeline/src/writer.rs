//! Result writer
//!
//! Single consumer of the results channel. Owns both CSV sinks: every
//! record goes to the total sink, `ALLOW` records additionally to the
//! accepted-only sink. The running total is published to the shared atomic
//! counter once per batch and again at termination; all buffers are flushed
//! before the writer returns.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{error, info};

use drishti_common::types::{SimulationResult, CSV_HEADER};

/// Records between progress-counter publishes.
const PROGRESS_BATCH: u64 = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkStats {
    pub written: u64,
    pub allowed: u64,
}

pub struct ResultWriter {
    total_path: PathBuf,
    accepted_path: PathBuf,
    progress: Arc<AtomicU64>,
}

impl ResultWriter {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(total_path: P, accepted_path: P, progress: Arc<AtomicU64>) -> Self {
        Self {
            total_path: total_path.into(),
            accepted_path: accepted_path.into(),
            progress,
        }
    }

    /// Drain the results channel into both sinks. A sink failure is fatal:
    /// the receiver is dropped, which unwinds the pipeline upstream.
    pub async fn run(self, mut results: mpsc::Receiver<SimulationResult>) -> Result<SinkStats> {
        let stats = self.write_all(&mut results).await;
        if let Err(error) = &stats {
            error!(%error, "result writer failed, cancelling run");
        }
        stats
    }

    async fn write_all(&self, results: &mut mpsc::Receiver<SimulationResult>) -> Result<SinkStats> {
        let total = File::create(&self.total_path)
            .await
            .with_context(|| format!("cannot create total sink {}", self.total_path.display()))?;
        let accepted = File::create(&self.accepted_path).await.with_context(|| {
            format!(
                "cannot create accepted-only sink {}",
                self.accepted_path.display()
            )
        })?;
        let mut total = BufWriter::new(total);
        let mut accepted = BufWriter::new(accepted);

        total.write_all(CSV_HEADER.as_bytes()).await?;
        total.write_all(b"\n").await?;
        accepted.write_all(CSV_HEADER.as_bytes()).await?;
        accepted.write_all(b"\n").await?;

        let mut stats = SinkStats::default();
        while let Some(result) = results.recv().await {
            let row = result.to_csv_row();
            total
                .write_all(row.as_bytes())
                .await
                .context("writing total sink")?;
            total.write_all(b"\n").await.context("writing total sink")?;

            if result.is_allowed() {
                accepted
                    .write_all(row.as_bytes())
                    .await
                    .context("writing accepted-only sink")?;
                accepted
                    .write_all(b"\n")
                    .await
                    .context("writing accepted-only sink")?;
                stats.allowed += 1;
            }

            stats.written += 1;
            if stats.written % PROGRESS_BATCH == 0 {
                self.progress.store(stats.written, Ordering::Relaxed);
            }
        }

        total.flush().await.context("flushing total sink")?;
        accepted.flush().await.context("flushing accepted-only sink")?;
        self.progress.store(stats.written, Ordering::Relaxed);

        info!(
            written = stats.written,
            allowed = stats.allowed,
            total_sink = %self.total_path.display(),
            accepted_sink = %self.accepted_path.display(),
            "result sinks complete"
        );
        Ok(stats)
    }
}
