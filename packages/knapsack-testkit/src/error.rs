pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Test database setup failed: {0}")]
	Message(String),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
