pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Scorer did not answer within {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
	#[error("Scorer unreachable at {url}.")]
	Unreachable { url: String },
	#[error("Scorer error ({status}): {detail}")]
	Status { status: u16, detail: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
