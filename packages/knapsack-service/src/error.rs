pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	Validation { message: String, field: Option<String> },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Immutable field {field}: {message}")]
	ImmutableField { field: String, message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Scorer unavailable: {message}")]
	ScorerUnavailable { message: String },
	#[error("Malformed scorer response: {message}")]
	MalformedScorerResponse { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Stable machine-readable code, shared by the HTTP surface and batch reports.
	pub fn code(&self) -> &'static str {
		match self {
			Self::Validation { .. } => "INVALID_REQUEST",
			Self::NotFound { .. } => "NOT_FOUND",
			Self::ImmutableField { .. } => "IMMUTABLE_FIELD",
			Self::Forbidden { .. } => "FORBIDDEN",
			Self::ScorerUnavailable { .. } => "SCORER_UNAVAILABLE",
			Self::MalformedScorerResponse { .. } => "MALFORMED_SCORER_RESPONSE",
			Self::Storage { .. } => "STORAGE_ERROR",
		}
	}

	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into(), field: None }
	}

	pub(crate) fn not_found(kind: &str, id: &str) -> Self {
		Self::NotFound { message: format!("{kind} {id} does not exist.") }
	}
}

impl From<knapsack_storage::Error> for Error {
	fn from(err: knapsack_storage::Error) -> Self {
		match err {
			knapsack_storage::Error::Conflict(message) => Self::Validation { message, field: None },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<knapsack_providers::Error> for Error {
	fn from(err: knapsack_providers::Error) -> Self {
		match err {
			knapsack_providers::Error::InvalidResponse { message } =>
				Self::MalformedScorerResponse { message },
			other => Self::ScorerUnavailable { message: other.to_string() },
		}
	}
}

impl From<knapsack_domain::ItemRejection> for Error {
	fn from(err: knapsack_domain::ItemRejection) -> Self {
		Self::Validation { message: err.message().to_string(), field: Some(err.field()) }
	}
}
