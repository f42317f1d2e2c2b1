use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, KnapsackService, Result};
use knapsack_domain::{CandidateState, Item, ItemKind, MatchCandidate, MatchStatistics};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrder {
	/// Newest run first, then scorer rank.
	#[default]
	Recency,
	/// Highest score first, then recency.
	Score,
}

/// A candidate as served to clients, with the resource name resolved at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateView {
	pub id: String,
	pub need_id: String,
	pub resource_id: String,
	pub resource_name: Option<String>,
	pub match_reason: String,
	pub match_statistics: MatchStatistics,
	#[serde(with = "knapsack_domain::time_serde")]
	pub created_at: OffsetDateTime,
	pub selected: bool,
}

impl KnapsackService {
	/// Returns the persisted candidates for a need the requester owns.
	///
	/// The first read of a never-matched need runs the engine; later reads serve the stored
	/// list without calling the scorer. A failed run leaves the need uncomputed.
	pub async fn get_candidates(
		&self,
		need_id: &str,
		requester: &str,
		order: CandidateOrder,
	) -> Result<Vec<CandidateView>> {
		let need = self.owned_need(need_id, requester).await?;

		if self.candidates.latest_run(need_id).await?.is_none() {
			let _guard = self.inflight.acquire(need_id).await;

			// Another reader may have finished the run while this one waited.
			if self.candidates.latest_run(need_id).await?.is_none() {
				self.run_match(&need).await?;
			}
		}

		let mut candidates = self.candidates.list_for_need(need_id).await?;

		sort_candidates(&mut candidates, order);

		self.to_views(candidates).await
	}

	/// Forces a new engine run. Earlier runs stay in the history.
	pub async fn refresh_candidates(
		&self,
		need_id: &str,
		requester: &str,
	) -> Result<Vec<CandidateView>> {
		let need = self.owned_need(need_id, requester).await?;
		let outcome = {
			let _guard = self.inflight.acquire(need_id).await;

			self.run_match(&need).await?
		};

		self.to_views(outcome.candidates).await
	}

	pub async fn candidate_status(&self, need_id: &str, requester: &str) -> Result<CandidateState> {
		self.owned_need(need_id, requester).await?;

		if self.inflight.is_running(need_id) {
			return Ok(CandidateState::Computing);
		}

		Ok(match self.candidates.latest_run(need_id).await? {
			Some(run) => CandidateState::Ready {
				candidate_count: run.candidate_count,
				computed_at: run.created_at,
			},
			None => CandidateState::Uncomputed,
		})
	}

	/// Marks a candidate selected on behalf of the owner of its need.
	pub async fn select_candidate(&self, candidate_id: &str, requester: &str) -> Result<CandidateView> {
		let candidate = self
			.candidates
			.get_candidate(candidate_id)
			.await?
			.ok_or_else(|| Error::not_found("Candidate", candidate_id))?;

		self.owned_need(&candidate.need_id, requester).await?;

		let selected = self.mark_selected(candidate_id).await?;
		let mut views = self.to_views(vec![selected]).await?;

		views.pop().ok_or_else(|| Error::not_found("Candidate", candidate_id))
	}

	async fn owned_need(&self, need_id: &str, requester: &str) -> Result<Item> {
		let need = self
			.items
			.get(ItemKind::Need, need_id)
			.await?
			.ok_or_else(|| Error::not_found("need", need_id))?;

		if !need.is_owned_by(requester) {
			return Err(Error::Forbidden {
				message: format!("Only the owner of need {need_id} may access its candidates."),
			});
		}

		Ok(need)
	}

	async fn to_views(&self, candidates: Vec<MatchCandidate>) -> Result<Vec<CandidateView>> {
		let mut resource_ids =
			candidates.iter().map(|candidate| candidate.resource_id.clone()).collect::<Vec<_>>();

		resource_ids.sort();
		resource_ids.dedup();

		let names = self
			.items
			.get_many(ItemKind::Resource, &resource_ids)
			.await?
			.into_iter()
			.map(|item| (item.id, item.name))
			.collect::<HashMap<_, _>>();

		Ok(candidates
			.into_iter()
			.map(|candidate| CandidateView {
				resource_name: names.get(&candidate.resource_id).cloned(),
				id: candidate.id,
				need_id: candidate.need_id,
				resource_id: candidate.resource_id,
				match_reason: candidate.match_reason,
				match_statistics: candidate.match_statistics,
				created_at: candidate.created_at,
				selected: candidate.selected,
			})
			.collect())
	}
}

fn sort_candidates(candidates: &mut [MatchCandidate], order: CandidateOrder) {
	match order {
		CandidateOrder::Recency => candidates.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then(a.match_statistics.rank.cmp(&b.match_statistics.rank))
		}),
		CandidateOrder::Score => candidates.sort_by(|a, b| {
			b.match_statistics
				.score
				.cmp(&a.match_statistics.score)
				.then(b.created_at.cmp(&a.created_at))
				.then(a.match_statistics.rank.cmp(&b.match_statistics.rank))
		}),
	}
}
