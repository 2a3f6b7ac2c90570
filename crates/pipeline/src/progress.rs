//! Progress reporting
//!
//! Periodically reads the atomic counter published by the writer and logs
//! completed / remaining counts against the estimate. Exits when the counter
//! reaches the estimate or the stop signal flips.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Wall-clock interval between progress lines.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub fn spawn_progress(
    counter: Arc<AtomicU64>,
    estimate: u128,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let completed = counter.load(Ordering::Relaxed);
                    log_progress(completed, estimate);
                    if estimate > 0 && u128::from(completed) >= estimate {
                        break;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn log_progress(completed: u64, estimate: u128) {
    let remaining = estimate
        .saturating_sub(u128::from(completed))
        .min(u128::from(u64::MAX)) as u64;
    let percent = if estimate == 0 {
        100.0
    } else {
        (completed as f64 / estimate as f64) * 100.0
    };
    info!(completed, remaining, "progress {percent:.1}%");
}
