use std::sync::Arc;

use knapsack_config::Config;
use knapsack_service::{KnapsackService, memory::MemoryStore};
use knapsack_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<KnapsackService>,
	db: Option<Arc<Db>>,
}
impl AppState {
	/// Opens the configured backend. Postgres schemas are bootstrapped before serving.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		if config.storage.is_memory() {
			tracing::warn!("Using the in-memory store. Data is lost on shutdown.");

			let service = KnapsackService::from_store(config, Arc::new(MemoryStore::new()));

			return Ok(Self::from_service(service));
		}

		let Some(postgres) = config.storage.postgres.clone() else {
			return Err(color_eyre::eyre::eyre!("storage.postgres is required."));
		};
		let db = Arc::new(Db::connect(&postgres).await?);

		db.ensure_schema().await?;

		let service = KnapsackService::from_store(config, db.clone());

		Ok(Self { service: Arc::new(service), db: Some(db) })
	}

	pub fn from_service(service: KnapsackService) -> Self {
		Self { service: Arc::new(service), db: None }
	}

	pub async fn close(&self) {
		if let Some(db) = self.db.as_ref() {
			db.close().await;
		}
	}
}
