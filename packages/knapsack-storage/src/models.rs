use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Result;
use knapsack_domain::{Attributes, Item, ItemKind, MatchCandidate, MatchStatistics};

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
	pub id: String,
	pub name: String,
	pub owner: Option<String>,
	pub description: Option<String>,
	pub quantity: Option<f64>,
	pub public: bool,
	pub attributes: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl ItemRow {
	pub fn into_item(self, kind: ItemKind) -> Item {
		let attributes = match self.attributes {
			Value::Object(map) => map,
			_ => Attributes::new(),
		};

		Item {
			id: self.id,
			kind,
			name: self.name,
			description: self.description,
			quantity: self.quantity,
			owner: self.owner,
			public: self.public,
			attributes,
			created_at: self.created_at,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct MatchRunRow {
	pub run_id: Uuid,
	pub need_id: String,
	pub top_k: i32,
	pub pool_size: i32,
	pub candidate_count: i32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MatchCandidateRow {
	pub id: String,
	pub run_id: Uuid,
	pub need_id: String,
	pub resource_id: String,
	pub match_reason: Option<String>,
	pub match_statistics: Value,
	pub created_at: OffsetDateTime,
	pub selected: bool,
}
impl MatchCandidateRow {
	pub fn from_candidate(run_id: Uuid, candidate: &MatchCandidate) -> Result<Self> {
		Ok(Self {
			id: candidate.id.clone(),
			run_id,
			need_id: candidate.need_id.clone(),
			resource_id: candidate.resource_id.clone(),
			match_reason: Some(candidate.match_reason.clone()),
			match_statistics: serde_json::to_value(&candidate.match_statistics)?,
			created_at: candidate.created_at,
			selected: candidate.selected,
		})
	}

	pub fn into_candidate(self) -> Result<MatchCandidate> {
		let match_statistics: MatchStatistics = serde_json::from_value(self.match_statistics)?;

		Ok(MatchCandidate {
			id: self.id,
			need_id: self.need_id,
			resource_id: self.resource_id,
			match_reason: self.match_reason.unwrap_or_default(),
			match_statistics,
			created_at: self.created_at,
			selected: self.selected,
		})
	}
}
