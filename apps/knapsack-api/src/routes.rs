use std::convert::Infallible;

use axum::{
	Extension, Json, Router,
	extract::{
		FromRequestParts, Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::{StatusCode, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::state::AppState;
use knapsack_domain::{CandidateState, Item, ItemKind, ItemPatch, NewItem};
use knapsack_service::{
	BatchReport, CandidateOrder, CandidateView, Error as ServiceError, SearchRequest,
};

/// Query keys with this prefix filter on attribute substrings, e.g. `attr.size=med`.
const ATTRIBUTE_PREFIX: &str = "attr.";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/health/scorer", get(scorer_health))
		.nest("/v1/needs", item_routes(ItemKind::Need).merge(candidate_routes()))
		.nest("/v1/resources", item_routes(ItemKind::Resource))
		.route("/v1/me/{kind}", get(list_owned))
		.route("/v1/candidates/{id}/select", post(select_candidate))
		.route("/v1/match/batch", post(match_batch))
		.with_state(state)
}

fn item_routes(kind: ItemKind) -> Router<AppState> {
	Router::new()
		.route("/", get(search_items).post(create_item))
		.route("/{id}", get(get_item).patch(update_item).delete(delete_item))
		.route("/{id}/visibility", post(set_visibility))
		.layer(Extension(kind))
}

fn candidate_routes() -> Router<AppState> {
	Router::new()
		.route("/{id}/candidates", get(get_candidates))
		.route("/{id}/candidates/refresh", post(refresh_candidates))
		.route("/{id}/candidates/status", get(candidate_status))
}

/// The caller identity forwarded by the auth relay, if any.
pub struct Requester(Option<String>);
impl Requester {
	fn optional(&self) -> Option<&str> {
		self.0.as_deref()
	}

	fn required(&self) -> Result<&str, ApiError> {
		self.0.as_deref().ok_or_else(|| {
			json_error(
				StatusCode::UNAUTHORIZED,
				"UNAUTHENTICATED",
				"A requester identity is required.",
				None,
			)
		})
	}
}

impl FromRequestParts<AppState> for Requester {
	type Rejection = Infallible;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		let header = state.service.cfg.security.requester_header.as_str();
		let requester = parts
			.headers
			.get(header)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(str::to_string);

		Ok(Self(requester))
	}
}

#[derive(Debug, Deserialize)]
struct VisibilityBody {
	public: bool,
}

#[derive(Debug, Deserialize)]
struct CandidatesQuery {
	#[serde(default)]
	order: CandidateOrder,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
	need_ids: Vec<String>,
}

async fn health() -> Json<Value> {
	Json(json!({ "status": "ok", "service": "knapsack-api" }))
}

async fn scorer_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({ "healthy": state.service.scorer_healthy().await }))
}

async fn search_items(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Item>>, ApiError> {
	let req = search_request(params)?;
	let items = state.service.search_items(kind, req, requester.optional()).await?;

	Ok(Json(items))
}

async fn create_item(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	payload: Result<Json<NewItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
	let requester = requester.required()?;
	let new = body(payload)?;
	let item = state.service.create_item(kind, new, Some(requester)).await?;

	Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
	let item = state.service.get_item(kind, &id, requester.optional()).await?;

	Ok(Json(item))
}

async fn update_item(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	Path(id): Path<String>,
	payload: Result<Json<ItemPatch>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
	let requester = requester.required()?;
	let patch = body(payload)?;
	let item = state.service.update_item(kind, &id, patch, Some(requester)).await?;

	Ok(Json(item))
}

async fn delete_item(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
	let requester = requester.required()?;

	state.service.delete_item(kind, &id, Some(requester)).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn set_visibility(
	State(state): State<AppState>,
	Extension(kind): Extension<ItemKind>,
	requester: Requester,
	Path(id): Path<String>,
	payload: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
	let requester = requester.required()?;
	let VisibilityBody { public } = body(payload)?;
	let item = state.service.set_visibility(kind, &id, public, Some(requester)).await?;

	Ok(Json(item))
}

async fn list_owned(
	State(state): State<AppState>,
	requester: Requester,
	Path(kind): Path<String>,
) -> Result<Json<Vec<Item>>, ApiError> {
	let requester = requester.required()?;
	let Some(kind) = ItemKind::from_plural(&kind) else {
		return Err(json_error(
			StatusCode::NOT_FOUND,
			"NOT_FOUND",
			format!("Unknown collection {kind}."),
			None,
		));
	};
	let items = state.service.list_owned(kind, requester).await?;

	Ok(Json(items))
}

async fn get_candidates(
	State(state): State<AppState>,
	requester: Requester,
	Path(need_id): Path<String>,
	query: Result<Query<CandidatesQuery>, QueryRejection>,
) -> Result<Json<Vec<CandidateView>>, ApiError> {
	let requester = requester.required()?;
	let Query(CandidatesQuery { order }) = query.map_err(|err| {
		json_error(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			err.body_text(),
			Some(vec!["$.order".to_string()]),
		)
	})?;
	let views = state.service.get_candidates(&need_id, requester, order).await?;

	Ok(Json(views))
}

async fn refresh_candidates(
	State(state): State<AppState>,
	requester: Requester,
	Path(need_id): Path<String>,
) -> Result<Json<Vec<CandidateView>>, ApiError> {
	let requester = requester.required()?;
	let views = state.service.refresh_candidates(&need_id, requester).await?;

	Ok(Json(views))
}

async fn candidate_status(
	State(state): State<AppState>,
	requester: Requester,
	Path(need_id): Path<String>,
) -> Result<Json<CandidateState>, ApiError> {
	let requester = requester.required()?;
	let status = state.service.candidate_status(&need_id, requester).await?;

	Ok(Json(status))
}

async fn select_candidate(
	State(state): State<AppState>,
	requester: Requester,
	Path(candidate_id): Path<String>,
) -> Result<Json<CandidateView>, ApiError> {
	let requester = requester.required()?;
	let view = state.service.select_candidate(&candidate_id, requester).await?;

	Ok(Json(view))
}

async fn match_batch(
	State(state): State<AppState>,
	requester: Requester,
	payload: Result<Json<BatchBody>, JsonRejection>,
) -> Result<Json<BatchReport>, ApiError> {
	let requester = requester.required()?;
	let BatchBody { need_ids } = body(payload)?;
	let report = state.service.match_batch(&need_ids, Some(requester)).await?;

	Ok(Json(report))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError>
where
	T: DeserializeOwned,
{
	payload
		.map(|Json(value)| value)
		.map_err(|err| json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.body_text(), None))
}

fn search_request(params: Vec<(String, String)>) -> Result<SearchRequest, ApiError> {
	let mut req = SearchRequest::default();

	for (key, value) in params {
		match key.as_str() {
			"q" => req.q = Some(value),
			"owner" => req.owner = Some(value),
			"limit" => req.limit = Some(parse_count("limit", &value)?),
			"offset" => req.offset = Some(parse_count("offset", &value)?),
			other =>
				if let Some(attribute) = other.strip_prefix(ATTRIBUTE_PREFIX)
					&& !attribute.is_empty()
				{
					req.attributes.push((attribute.to_string(), value));
				},
		}
	}

	Ok(req)
}

fn parse_count(name: &str, raw: &str) -> Result<u32, ApiError> {
	raw.trim().parse().map_err(|_| {
		json_error(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			format!("{name} must be a non-negative integer."),
			Some(vec![format!("$.{name}")]),
		)
	})
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let code = err.code();
		let message = err.to_string();

		match err {
			ServiceError::Validation { field, .. } =>
				json_error(StatusCode::BAD_REQUEST, code, message, field.map(|field| vec![field])),
			ServiceError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, code, message, None),
			ServiceError::ImmutableField { field, .. } =>
				json_error(StatusCode::CONFLICT, code, message, Some(vec![field])),
			ServiceError::Forbidden { .. } => json_error(StatusCode::FORBIDDEN, code, message, None),
			ServiceError::ScorerUnavailable { .. } => {
				tracing::warn!(error = %message, "Scorer unavailable.");

				json_error(StatusCode::SERVICE_UNAVAILABLE, code, message, None)
			},
			ServiceError::MalformedScorerResponse { .. } => {
				tracing::warn!(error = %message, "Scorer answered with a malformed payload.");

				json_error(StatusCode::BAD_GATEWAY, code, message, None)
			},
			ServiceError::Storage { .. } => {
				tracing::error!(error = %message, "Storage failure.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, code, message, None)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
