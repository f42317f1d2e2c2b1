#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Match statistics JSON is invalid: {0}")]
	CorruptStatistics(#[from] serde_json::Error),
	#[error("{0}")]
	Conflict(String),
}
