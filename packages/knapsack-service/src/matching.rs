use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, KnapsackService, MatchRun, Result};
use knapsack_domain::{Item, ItemKind, MatchCandidate, Selection, candidate};

/// Result of one single-need engine run, as persisted.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
	pub run: MatchRun,
	pub candidates: Vec<MatchCandidate>,
	pub discarded: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
	pub recorded: Vec<BatchRecorded>,
	pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRecorded {
	pub need_id: String,
	pub run_id: Uuid,
	pub candidate_count: u32,
	pub discarded: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
	pub need_id: String,
	pub error_code: String,
	pub message: String,
}
impl BatchFailure {
	fn new(need_id: &str, err: &Error) -> Self {
		Self {
			need_id: need_id.to_string(),
			error_code: err.code().to_string(),
			message: err.to_string(),
		}
	}
}

impl KnapsackService {
	/// Scores `need` against its pool and records the validated result as one run.
	///
	/// Nothing is written when the scorer fails or answers with a structurally broken payload.
	/// Callers serialize runs per need through the in-flight guard.
	pub(crate) async fn run_match(&self, need: &Item) -> Result<MatchOutcome> {
		let top_k = self.cfg.matching.top_k;
		let pool = self
			.items
			.resource_pool(need.owner.as_deref(), self.cfg.matching.pool_size as usize)
			.await?;

		if pool.is_empty() {
			let (run, candidates) =
				self.record_candidates(&need.id, Vec::new(), 0, top_k).await?;

			tracing::info!(need_id = %need.id, "Empty resource pool. Recorded an empty run.");

			return Ok(MatchOutcome { run, candidates, discarded: 0 });
		}

		let scored =
			self.scorer.score(&self.cfg.scorer, need, &pool, top_k).await.map_err(|err| {
				tracing::warn!(need_id = %need.id, error = %err, "Scorer call failed.");

				Error::from(err)
			})?;
		let returned = scored.len();
		let pool_ids = pool.iter().map(|item| item.id.as_str()).collect::<HashSet<_>>();
		let Selection { drafts, kept, discarded } = candidate::select_candidates(&pool_ids, &scored);
		let (run, candidates) =
			self.record_candidates(&need.id, drafts, pool.len(), top_k).await?;

		tracing::info!(
			need_id = %need.id,
			pool_size = pool.len(),
			returned,
			kept,
			discarded,
			"Match run recorded."
		);

		Ok(MatchOutcome { run, candidates, discarded })
	}

	/// Scores many needs in one scorer call against a shared pool.
	///
	/// With a requester, every need must belong to them and their private resources join the
	/// pool. Each need is recorded independently; one failing need does not block the others.
	pub async fn match_batch(
		&self,
		need_ids: &[String],
		requester: Option<&str>,
	) -> Result<BatchReport> {
		let need_ids = need_ids
			.iter()
			.map(|id| id.trim())
			.filter(|id| !id.is_empty())
			.map(str::to_string)
			.collect::<BTreeSet<_>>();

		if need_ids.is_empty() {
			return Err(Error::Validation {
				message: "need_ids must not be empty.".to_string(),
				field: Some("$.need_ids".to_string()),
			});
		}
		if need_ids.len() > self.cfg.matching.batch_max_needs as usize {
			return Err(Error::Validation {
				message: format!(
					"At most {} needs may be matched in one batch.",
					self.cfg.matching.batch_max_needs
				),
				field: Some("$.need_ids".to_string()),
			});
		}

		let mut report = BatchReport::default();
		let mut needs = Vec::with_capacity(need_ids.len());

		for need_id in &need_ids {
			match self.items.get(ItemKind::Need, need_id).await? {
				Some(need) => {
					if let Some(requester) = requester
						&& !need.is_owned_by(requester)
					{
						return Err(Error::Forbidden {
							message: format!("Need {need_id} is not owned by the requester."),
						});
					}

					needs.push(need);
				},
				None => report
					.failed
					.push(BatchFailure::new(need_id, &Error::not_found("need", need_id))),
			}
		}

		if needs.is_empty() {
			return Ok(report);
		}

		// Sorted acquisition keeps concurrent batches from deadlocking.
		let mut guards = Vec::with_capacity(needs.len());

		for need in &needs {
			guards.push(self.inflight.acquire(&need.id).await);
		}

		let top_k = self.cfg.matching.batch_top_k;
		let pool = self.items.resource_pool(requester, self.cfg.matching.pool_size as usize).await?;
		let mut scores = if pool.is_empty() {
			Default::default()
		} else {
			self.scorer.score_batch(&self.cfg.scorer, &needs, &pool, top_k).await.map_err(
				|err| {
					tracing::warn!(needs = needs.len(), error = %err, "Batch scorer call failed.");

					Error::from(err)
				},
			)?
		};
		let pool_ids = pool.iter().map(|item| item.id.as_str()).collect::<HashSet<_>>();

		for need in &needs {
			let scored = match scores.remove(&need.id) {
				Some(Ok(scored)) => scored,
				Some(Err(err)) => {
					let err = Error::from(err);

					tracing::warn!(need_id = %need.id, error = %err, "Batch entry rejected.");
					report.failed.push(BatchFailure::new(&need.id, &err));

					continue;
				},
				None => Vec::new(),
			};
			let Selection { drafts, discarded, .. } =
				candidate::select_candidates(&pool_ids, &scored);

			match self.record_candidates(&need.id, drafts, pool.len(), top_k).await {
				Ok((run, candidates)) => report.recorded.push(BatchRecorded {
					need_id: need.id.clone(),
					run_id: run.run_id,
					candidate_count: candidates.len() as u32,
					discarded: discarded as u32,
				}),
				Err(err) => {
					tracing::warn!(need_id = %need.id, error = %err, "Failed to record batch run.");
					report.failed.push(BatchFailure::new(&need.id, &err));
				},
			}
		}

		drop(guards);

		tracing::info!(
			pool_size = pool.len(),
			recorded = report.recorded.len(),
			failed = report.failed.len(),
			"Batch match finished."
		);

		Ok(report)
	}

	/// Matches up to `limit` public needs that were never matched, against public resources.
	pub async fn match_unmatched(&self, limit: usize) -> Result<BatchReport> {
		let limit = limit.min(self.cfg.matching.batch_max_needs as usize);
		let needs = self.candidates.unmatched_needs(limit).await?;

		if needs.is_empty() {
			return Ok(BatchReport::default());
		}

		let need_ids = needs.into_iter().map(|need| need.id).collect::<Vec<_>>();

		self.match_batch(&need_ids, None).await
	}
}
