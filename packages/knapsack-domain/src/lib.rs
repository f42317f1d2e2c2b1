pub mod candidate;
pub mod item;
pub mod text;
pub mod time_serde;

pub use candidate::{
	CandidateDraft, CandidateState, ConfidenceLevel, MatchCandidate, MatchStatistics,
	ScoredCandidate, Selection,
};
pub use item::{Attributes, Item, ItemKind, ItemPatch, ItemRejection, NewItem, OwnerViolation};
