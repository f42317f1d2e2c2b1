mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Matching, Postgres, ScorerConfig, Search, Security, Service, Storage, Worker};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::Parse { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Invalid {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if !matches!(cfg.storage.backend.as_str(), "postgres" | "memory") {
		return Err(Error::Invalid {
			message: "storage.backend must be one of postgres or memory.".to_string(),
		});
	}
	if cfg.storage.backend == "postgres" {
		let Some(postgres) = cfg.storage.postgres.as_ref() else {
			return Err(Error::Invalid {
				message: "storage.postgres is required when storage.backend is postgres."
					.to_string(),
			});
		};

		if postgres.dsn.trim().is_empty() {
			return Err(Error::Invalid {
				message: "storage.postgres.dsn must be non-empty.".to_string(),
			});
		}
		if postgres.pool_max_conns == 0 {
			return Err(Error::Invalid {
				message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}
	if cfg.scorer.api_base.trim().is_empty() {
		return Err(Error::Invalid { message: "scorer.api_base must be non-empty.".to_string() });
	}

	for (label, value) in [
		("scorer.timeout_ms", cfg.scorer.timeout_ms),
		("scorer.batch_timeout_ms", cfg.scorer.batch_timeout_ms),
		("scorer.health_timeout_ms", cfg.scorer.health_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Invalid { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.scorer.batch_timeout_ms < cfg.scorer.timeout_ms {
		return Err(Error::Invalid {
			message: "scorer.batch_timeout_ms must be at least scorer.timeout_ms.".to_string(),
		});
	}
	if cfg.matching.pool_size == 0 {
		return Err(Error::Invalid {
			message: "matching.pool_size must be greater than zero.".to_string(),
		});
	}
	if !(1..=50).contains(&cfg.matching.top_k) {
		return Err(Error::Invalid {
			message: "matching.top_k must be in the range 1-50.".to_string(),
		});
	}
	if !(1..=20).contains(&cfg.matching.batch_top_k) {
		return Err(Error::Invalid {
			message: "matching.batch_top_k must be in the range 1-20.".to_string(),
		});
	}
	if cfg.matching.batch_max_needs == 0 {
		return Err(Error::Invalid {
			message: "matching.batch_max_needs must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_limit == 0 {
		return Err(Error::Invalid {
			message: "search.max_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit == 0 || cfg.search.default_limit > cfg.search.max_limit {
		return Err(Error::Invalid {
			message: "search.default_limit must be in the range 1-search.max_limit.".to_string(),
		});
	}
	if cfg.security.requester_header.trim().is_empty() {
		return Err(Error::Invalid {
			message: "security.requester_header must be non-empty.".to_string(),
		});
	}
	if cfg.worker.interval_ms == 0 {
		return Err(Error::Invalid {
			message: "worker.interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.batch_size == 0 || cfg.worker.batch_size > cfg.matching.batch_max_needs {
		return Err(Error::Invalid {
			message: "worker.batch_size must be in the range 1-matching.batch_max_needs."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.scorer.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.scorer.api_key = None;
	}

	let trimmed = cfg.scorer.api_base.trim_end_matches('/').to_string();

	cfg.scorer.api_base = trimmed;
	cfg.storage.backend = cfg.storage.backend.trim().to_ascii_lowercase();
}
