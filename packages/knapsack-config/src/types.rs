use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub scorer: ScorerConfig,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub security: Security,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	#[serde(default = "default_backend")]
	pub backend: String,
	pub postgres: Option<Postgres>,
}
impl Storage {
	pub fn is_memory(&self) -> bool {
		self.backend == "memory"
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// The external matching service. Paths are appended to `api_base`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
	pub api_base: String,
	#[serde(default = "default_match_path")]
	pub match_path: String,
	#[serde(default = "default_batch_path")]
	pub batch_path: String,
	#[serde(default = "default_health_path")]
	pub health_path: String,
	/// Optional. Sent as a bearer token when present.
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_batch_timeout_ms")]
	pub batch_timeout_ms: u64,
	#[serde(default = "default_health_timeout_ms")]
	pub health_timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Matching {
	/// Upper bound on resources sent to the scorer for one run.
	pub pool_size: u32,
	pub top_k: u32,
	pub batch_top_k: u32,
	pub batch_max_needs: u32,
}
impl Default for Matching {
	fn default() -> Self {
		Self { pool_size: 200, top_k: 10, batch_top_k: 5, batch_max_needs: 50 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 50, max_limit: 500 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Header carrying the authenticated user identity, set by the auth relay.
	pub requester_header: String,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: false, requester_header: "X-Knapsack-User".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub interval_ms: u64,
	pub batch_size: u32,
}
impl Default for Worker {
	fn default() -> Self {
		Self { interval_ms: 60_000, batch_size: 20 }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_backend() -> String {
	"postgres".to_string()
}

fn default_match_path() -> String {
	"/match".to_string()
}

fn default_batch_path() -> String {
	"/match/batch".to_string()
}

fn default_health_path() -> String {
	"/health".to_string()
}

fn default_timeout_ms() -> u64 {
	30_000
}

fn default_batch_timeout_ms() -> u64 {
	60_000
}

fn default_health_timeout_ms() -> u64 {
	5_000
}
