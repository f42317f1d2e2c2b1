use std::{sync::Arc, time::Duration};

use tokio::time::{self as tokio_time, MissedTickBehavior};

use knapsack_service::{BatchReport, KnapsackService};

pub struct WorkerState {
	pub service: Arc<KnapsackService>,
	pub interval: Duration,
	/// Upper bound of needs scored per sweep.
	pub batch_size: usize,
}

/// Sweeps on every tick until Ctrl-C. A failed sweep is logged and retried on the next tick.
pub async fn run_worker(state: &WorkerState) {
	let mut ticker = tokio_time::interval(state.interval);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	tracing::info!(interval_ms = state.interval.as_millis() as u64, "Batch worker started.");

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				if let Err(err) = sweep_once(state).await {
					tracing::error!(error = %err, "Batch sweep failed.");
				}
			},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Shutdown signal received.");

				break;
			},
		}
	}
}

/// Matches up to `batch_size` public needs that have never been matched.
pub async fn sweep_once(state: &WorkerState) -> knapsack_service::Result<BatchReport> {
	let report = state.service.match_unmatched(state.batch_size).await?;

	for failure in &report.failed {
		tracing::warn!(
			need_id = %failure.need_id,
			error_code = %failure.error_code,
			message = %failure.message,
			"Need was not matched."
		);
	}

	if !report.recorded.is_empty() || !report.failed.is_empty() {
		tracing::info!(
			recorded = report.recorded.len(),
			failed = report.failed.len(),
			"Batch sweep finished."
		);
	}

	Ok(report)
}
