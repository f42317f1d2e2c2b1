use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, KnapsackService, Result};
use knapsack_domain::{CandidateDraft, MatchCandidate};

/// One scoring pass for one need. A run with no candidates means "computed, nothing found".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRun {
	pub run_id: Uuid,
	pub need_id: String,
	pub top_k: u32,
	pub pool_size: u32,
	pub candidate_count: u32,
	#[serde(with = "knapsack_domain::time_serde")]
	pub created_at: OffsetDateTime,
}

impl KnapsackService {
	/// Persists a batch of drafts for `need_id` as one run; all rows share the run timestamp.
	pub async fn record_candidates(
		&self,
		need_id: &str,
		drafts: Vec<CandidateDraft>,
		pool_size: usize,
		top_k: u32,
	) -> Result<(MatchRun, Vec<MatchCandidate>)> {
		let now = OffsetDateTime::now_utc();
		let run = MatchRun {
			run_id: Uuid::new_v4(),
			need_id: need_id.to_string(),
			top_k,
			pool_size: pool_size as u32,
			candidate_count: drafts.len() as u32,
			created_at: now,
		};
		let candidates = drafts
			.into_iter()
			.map(|draft| MatchCandidate {
				id: knapsack_storage::new_id(),
				need_id: need_id.to_string(),
				resource_id: draft.resource_id,
				match_reason: draft.match_reason,
				match_statistics: draft.match_statistics,
				created_at: now,
				selected: false,
			})
			.collect::<Vec<_>>();

		self.candidates.record_run(&run, &candidates).await?;

		Ok((run, candidates))
	}

	pub async fn list_for_need(&self, need_id: &str) -> Result<Vec<MatchCandidate>> {
		self.candidates.list_for_need(need_id).await
	}

	/// Sets `selected` on one candidate; other candidates of the need are untouched.
	pub async fn mark_selected(&self, candidate_id: &str) -> Result<MatchCandidate> {
		self.candidates
			.mark_selected(candidate_id)
			.await?
			.ok_or_else(|| Error::not_found("Candidate", candidate_id))
	}
}
