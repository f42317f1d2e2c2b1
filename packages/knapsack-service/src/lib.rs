pub mod candidates;
pub mod items;
pub mod matching;
pub mod memory;
pub mod retrieval;

mod error;
mod inflight;
mod postgres;

pub use candidates::MatchRun;
pub use error::{Error, Result};
pub use items::SearchRequest;
pub use matching::{BatchFailure, BatchRecorded, BatchReport, MatchOutcome};
pub use retrieval::{CandidateOrder, CandidateView};

use std::{future::Future, pin::Pin, sync::Arc};

use inflight::InflightRuns;
use knapsack_config::{Config, ScorerConfig};
use knapsack_domain::{Item, ItemKind, MatchCandidate, ScoredCandidate};
use knapsack_providers::scorer::{self, BatchScores};
use knapsack_storage::items::ItemQuery;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable storage and search over needs and resources.
pub trait ItemStore
where
	Self: Send + Sync,
{
	fn insert<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<()>>;

	fn get<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<Option<Item>>>;

	/// Items with the given ids; absent ids are skipped.
	fn get_many<'a>(
		&'a self,
		kind: ItemKind,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Item>>>;

	/// Newest first.
	fn search<'a>(&'a self, kind: ItemKind, query: &'a ItemQuery)
	-> BoxFuture<'a, Result<Vec<Item>>>;

	/// Writes the mutable fields of `item`. Returns `None` when the row is gone.
	fn update<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<Option<Item>>>;

	fn set_public<'a>(
		&'a self,
		kind: ItemKind,
		id: &'a str,
		public: bool,
	) -> BoxFuture<'a, Result<Option<Item>>>;

	fn delete<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Public resources plus those owned by `owner`, newest first.
	fn resource_pool<'a>(
		&'a self,
		owner: Option<&'a str>,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<Item>>>;
}

/// Append-only ledger of match runs and their candidates.
pub trait CandidateStore
where
	Self: Send + Sync,
{
	/// Persists the run and every candidate, or nothing.
	fn record_run<'a>(
		&'a self,
		run: &'a MatchRun,
		candidates: &'a [MatchCandidate],
	) -> BoxFuture<'a, Result<()>>;

	/// Newest run first, scorer rank within a run.
	fn list_for_need<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Vec<MatchCandidate>>>;

	fn latest_run<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Option<MatchRun>>>;

	fn get_candidate<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>>;

	fn mark_selected<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>>;

	/// Public needs that have no recorded run, oldest first.
	fn unmatched_needs<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Item>>>;
}

/// The external collaborator that ranks resources against needs.
pub trait Scorer
where
	Self: Send + Sync,
{
	fn score<'a>(
		&'a self,
		cfg: &'a ScorerConfig,
		need: &'a Item,
		resources: &'a [Item],
		top_k: u32,
	) -> BoxFuture<'a, knapsack_providers::Result<Vec<ScoredCandidate>>>;

	fn score_batch<'a>(
		&'a self,
		cfg: &'a ScorerConfig,
		needs: &'a [Item],
		resources: &'a [Item],
		top_k: u32,
	) -> BoxFuture<'a, knapsack_providers::Result<BatchScores>>;

	fn health<'a>(&'a self, cfg: &'a ScorerConfig) -> BoxFuture<'a, bool>;
}

pub struct KnapsackService {
	pub cfg: Config,
	pub items: Arc<dyn ItemStore>,
	pub candidates: Arc<dyn CandidateStore>,
	pub scorer: Arc<dyn Scorer>,
	inflight: InflightRuns,
}
impl KnapsackService {
	pub fn with_scorer(
		cfg: Config,
		items: Arc<dyn ItemStore>,
		candidates: Arc<dyn CandidateStore>,
		scorer: Arc<dyn Scorer>,
	) -> Self {
		Self { cfg, items, candidates, scorer, inflight: InflightRuns::default() }
	}

	/// One backend serving both stores, e.g. [`memory::MemoryStore`] or a Postgres `Db`.
	pub fn from_store<S>(cfg: Config, store: Arc<S>) -> Self
	where
		S: ItemStore + CandidateStore + 'static,
	{
		Self::with_store(cfg, store, Arc::new(DefaultScorer))
	}

	pub fn with_store<S>(cfg: Config, store: Arc<S>, scorer: Arc<dyn Scorer>) -> Self
	where
		S: ItemStore + CandidateStore + 'static,
	{
		Self::with_scorer(cfg, store.clone(), store, scorer)
	}

	pub async fn scorer_healthy(&self) -> bool {
		self.scorer.health(&self.cfg.scorer).await
	}
}

struct DefaultScorer;
impl Scorer for DefaultScorer {
	fn score<'a>(
		&'a self,
		cfg: &'a ScorerConfig,
		need: &'a Item,
		resources: &'a [Item],
		top_k: u32,
	) -> BoxFuture<'a, knapsack_providers::Result<Vec<ScoredCandidate>>> {
		Box::pin(scorer::score(cfg, need, resources, top_k))
	}

	fn score_batch<'a>(
		&'a self,
		cfg: &'a ScorerConfig,
		needs: &'a [Item],
		resources: &'a [Item],
		top_k: u32,
	) -> BoxFuture<'a, knapsack_providers::Result<BatchScores>> {
		Box::pin(scorer::score_batch(cfg, needs, resources, top_k))
	}

	fn health<'a>(&'a self, cfg: &'a ScorerConfig) -> BoxFuture<'a, bool> {
		Box::pin(scorer::health(cfg))
	}
}
