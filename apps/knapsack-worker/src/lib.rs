pub mod worker;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use knapsack_service::{KnapsackService, memory::MemoryStore};
use knapsack_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = knapsack_cli::VERSION,
	rename_all = "kebab",
	styles = knapsack_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Run a single sweep and exit.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = knapsack_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let interval = Duration::from_millis(config.worker.interval_ms);
	let batch_size = config.worker.batch_size as usize;
	let mut db = None;
	let service = if config.storage.is_memory() {
		tracing::warn!("Using the in-memory store. Only needs created by this process are swept.");

		KnapsackService::from_store(config, Arc::new(MemoryStore::new()))
	} else {
		let Some(postgres) = config.storage.postgres.clone() else {
			return Err(color_eyre::eyre::eyre!("storage.postgres is required."));
		};
		let handle = Arc::new(Db::connect(&postgres).await?);

		handle.ensure_schema().await?;

		db = Some(handle.clone());

		KnapsackService::from_store(config, handle)
	};
	let state = worker::WorkerState { service: Arc::new(service), interval, batch_size };

	if args.once {
		worker::sweep_once(&state).await?;
	} else {
		worker::run_worker(&state).await;
	}

	if let Some(db) = db {
		db.close().await;
	}

	Ok(())
}
