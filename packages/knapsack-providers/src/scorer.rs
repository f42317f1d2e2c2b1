use std::{collections::HashMap, time::Duration};

use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};
use knapsack_config::ScorerConfig;
use knapsack_domain::{ConfidenceLevel, Item, ScoredCandidate, candidate::MAX_SCORE};

/// Per-need outcome of a batch call. A malformed entry only fails its own need.
pub type BatchScores = HashMap<String, Result<Vec<ScoredCandidate>>>;

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
	need: &'a Item,
	resources: &'a [Item],
	top_k: u32,
}

#[derive(Debug, Serialize)]
struct BatchMatchRequest<'a> {
	needs: &'a [Item],
	resources: &'a [Item],
	top_k: u32,
}

pub async fn score(
	cfg: &ScorerConfig,
	need: &Item,
	resources: &[Item],
	top_k: u32,
) -> Result<Vec<ScoredCandidate>> {
	let body = MatchRequest { need, resources, top_k };
	let json = post_json(cfg, &cfg.match_path, cfg.timeout_ms, &body).await?;

	parse_match_response(&json)
}

pub async fn score_batch(
	cfg: &ScorerConfig,
	needs: &[Item],
	resources: &[Item],
	top_k: u32,
) -> Result<BatchScores> {
	let body = BatchMatchRequest { needs, resources, top_k };
	let json = post_json(cfg, &cfg.batch_path, cfg.batch_timeout_ms, &body).await?;

	parse_batch_response(&json)
}

/// True only when the scorer answers in time with `status == "healthy"`.
pub async fn health(cfg: &ScorerConfig) -> bool {
	match probe_health(cfg).await {
		Ok(healthy) => healthy,
		Err(err) => {
			tracing::debug!(error = %err, "Scorer health probe failed.");

			false
		},
	}
}

async fn probe_health(cfg: &ScorerConfig) -> Result<bool> {
	let client =
		Client::builder().timeout(Duration::from_millis(cfg.health_timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.health_path);
	let res = client
		.get(&url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.send()
		.await
		.map_err(|err| classify(err, &url, cfg.health_timeout_ms))?;

	if !res.status().is_success() {
		return Ok(false);
	}

	let json: Value = res.json().await?;

	Ok(json.get("status").and_then(Value::as_str) == Some("healthy"))
}

async fn post_json<B>(cfg: &ScorerConfig, path: &str, timeout_ms: u64, body: &B) -> Result<Value>
where
	B: Serialize + ?Sized,
{
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, path);
	let res = client
		.post(&url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(body)
		.send()
		.await
		.map_err(|err| classify(err, &url, timeout_ms))?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Status { status: status.as_u16(), detail: error_detail(res).await });
	}

	let bytes = res.bytes().await.map_err(|err| classify(err, &url, timeout_ms))?;

	serde_json::from_slice(&bytes).map_err(|err| Error::InvalidResponse {
		message: format!("Scorer response is not valid JSON: {err}."),
	})
}

fn classify(err: reqwest::Error, url: &str, timeout_ms: u64) -> Error {
	if err.is_timeout() {
		return Error::Timeout { timeout_ms };
	}
	if err.is_connect() || err.is_request() {
		return Error::Unreachable { url: url.to_string() };
	}

	Error::Reqwest(err)
}

async fn error_detail(res: Response) -> String {
	let fallback = res.status().canonical_reason().unwrap_or("unknown status").to_string();
	let Ok(raw) = res.text().await else { return fallback };

	match serde_json::from_str::<Value>(&raw) {
		Ok(json) => match json.get("detail") {
			Some(Value::String(detail)) => detail.clone(),
			Some(other) => other.to_string(),
			None => fallback,
		},
		Err(_) if !raw.trim().is_empty() => raw.trim().to_string(),
		Err(_) => fallback,
	}
}

fn parse_match_response(json: &Value) -> Result<Vec<ScoredCandidate>> {
	let candidates = json.get("candidates").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Scorer response is missing candidates array.".to_string() }
	})?;

	parse_candidates(candidates)
}

fn parse_batch_response(json: &Value) -> Result<BatchScores> {
	let by_need = json.as_object().ok_or_else(|| Error::InvalidResponse {
		message: "Batch scorer response must map need ids to candidate arrays.".to_string(),
	})?;
	let mut out = HashMap::with_capacity(by_need.len());

	for (need_id, value) in by_need {
		let parsed = match value.as_array() {
			Some(candidates) => parse_candidates(candidates),
			None => Err(Error::InvalidResponse {
				message: format!("Batch entry for need {need_id} is not an array."),
			}),
		};

		out.insert(need_id.clone(), parsed);
	}

	Ok(out)
}

fn parse_candidates(candidates: &[Value]) -> Result<Vec<ScoredCandidate>> {
	candidates.iter().enumerate().map(|(index, value)| parse_candidate(index, value)).collect()
}

fn parse_candidate(index: usize, value: &Value) -> Result<ScoredCandidate> {
	let invalid = |message: &str| Error::InvalidResponse {
		message: format!("Scorer candidate {index} {message}"),
	};
	let resource_ids = value
		.get("resource_ids")
		.and_then(Value::as_array)
		.ok_or_else(|| invalid("is missing resource_ids."))?
		.iter()
		.map(|id| id.as_str().map(str::to_string))
		.collect::<Option<Vec<_>>>()
		.ok_or_else(|| invalid("has a non-string resource id."))?;
	let score = value
		.get("feasibility_score")
		.and_then(Value::as_u64)
		.ok_or_else(|| invalid("is missing an integer feasibility_score."))?;

	if score > u64::from(MAX_SCORE) {
		return Err(invalid("has feasibility_score outside 0-100."));
	}

	let explanation = value
		.get("explanation")
		.and_then(Value::as_str)
		.ok_or_else(|| invalid("is missing explanation."))?
		.to_string();
	let gaps = match value.get("gaps") {
		None | Some(Value::Null) => Vec::new(),
		Some(Value::Array(items)) => items
			.iter()
			.map(|gap| gap.as_str().map(str::to_string))
			.collect::<Option<Vec<_>>>()
			.ok_or_else(|| invalid("has a non-string gap."))?,
		Some(_) => return Err(invalid("has gaps that are not an array.")),
	};
	let confidence = value
		.get("confidence")
		.and_then(Value::as_str)
		.and_then(ConfidenceLevel::parse)
		.ok_or_else(|| invalid("has a missing or unknown confidence label."))?;

	Ok(ScoredCandidate {
		resource_ids,
		feasibility_score: score as u8,
		explanation,
		gaps,
		confidence,
	})
}
