use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
	Low,
	Medium,
	High,
}
impl ConfidenceLevel {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"low" => Some(Self::Low),
			"medium" => Some(Self::Medium),
			"high" => Some(Self::High),
			_ => None,
		}
	}
}

/// One scorer suggestion: a combination of resources that together could satisfy a need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
	pub resource_ids: Vec<String>,
	pub feasibility_score: u8,
	pub explanation: String,
	#[serde(default)]
	pub gaps: Vec<String>,
	pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
	/// Always `score / 100`, so ordering by confidence never contradicts ordering by score.
	pub confidence: f32,
	pub score: u8,
	pub confidence_level: ConfidenceLevel,
	#[serde(default)]
	pub gaps: Vec<String>,
	#[serde(default)]
	pub combination: Vec<String>,
	/// 1-based position in the scorer's answer.
	pub rank: u32,
}
impl MatchStatistics {
	pub fn new(
		score: u8,
		confidence_level: ConfidenceLevel,
		gaps: Vec<String>,
		combination: Vec<String>,
		rank: u32,
	) -> Self {
		let score = score.min(MAX_SCORE);

		Self {
			confidence: confidence_for_score(score),
			score,
			confidence_level,
			gaps,
			combination,
			rank,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
	pub id: String,
	pub need_id: String,
	pub resource_id: String,
	pub match_reason: String,
	pub match_statistics: MatchStatistics,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub selected: bool,
}

/// A validated candidate waiting to be persisted; ids and timestamps are assigned on write.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDraft {
	pub resource_id: String,
	pub match_reason: String,
	pub match_statistics: MatchStatistics,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
	pub drafts: Vec<CandidateDraft>,
	pub kept: usize,
	pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CandidateState {
	Uncomputed,
	Computing,
	Ready {
		candidate_count: u32,
		#[serde(with = "crate::time_serde")]
		computed_at: OffsetDateTime,
	},
}

pub fn confidence_for_score(score: u8) -> f32 {
	f32::from(score.min(MAX_SCORE)) / f32::from(MAX_SCORE)
}

/// Keeps scorer suggestions whose resources all come from `pool`, in scorer order.
///
/// A combination naming any resource outside the pool is dropped whole. A resource already
/// emitted by a higher-ranked combination is not emitted again.
pub fn select_candidates(pool: &HashSet<&str>, scored: &[ScoredCandidate]) -> Selection {
	let mut selection = Selection::default();
	let mut emitted = HashSet::new();

	for (index, candidate) in scored.iter().enumerate() {
		if candidate.resource_ids.is_empty()
			|| candidate.resource_ids.iter().any(|id| !pool.contains(id.as_str()))
		{
			selection.discarded += 1;

			continue;
		}

		let mut combination = Vec::with_capacity(candidate.resource_ids.len());

		for id in &candidate.resource_ids {
			if !combination.contains(id) {
				combination.push(id.clone());
			}
		}

		let fresh =
			combination.iter().filter(|id| !emitted.contains(id.as_str())).cloned().collect::<Vec<_>>();

		if fresh.is_empty() {
			selection.discarded += 1;

			continue;
		}

		let statistics = MatchStatistics::new(
			candidate.feasibility_score,
			candidate.confidence,
			candidate.gaps.clone(),
			combination,
			(index + 1) as u32,
		);

		for resource_id in fresh {
			emitted.insert(resource_id.clone());
			selection.drafts.push(CandidateDraft {
				resource_id,
				match_reason: candidate.explanation.clone(),
				match_statistics: statistics.clone(),
			});
		}

		selection.kept += 1;
	}

	selection
}
