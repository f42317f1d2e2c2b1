use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cannot read {path:?}: {source}")]
	Read { path: PathBuf, source: std::io::Error },
	#[error("Cannot parse {path:?} as TOML: {source}")]
	Parse { path: PathBuf, source: toml::de::Error },
	#[error("Invalid config: {message}")]
	Invalid { message: String },
}
