// REST API with Axum
//
// Thin mapping from HTTP to RankingService. Every response uses the same
// envelope; store and transport details stay in the log.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::character::{Character, CharacterId, Gender};
use crate::enroll::CreateRequest;
use crate::error::RankingError;
use crate::leaderboard::TopFilter;
use crate::service::RankingService;
use crate::voting::VoteRequest;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: RankingService,
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// Error side of every handler
pub struct ApiError(RankingError);

impl From<RankingError> for ApiError {
    fn from(err: RankingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            RankingError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
            RankingError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            RankingError::Conflict(message) => (StatusCode::CONFLICT, message),
            RankingError::Upstream(detail) => {
                error!(%detail, "directory lookup failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Character directory is unavailable, try again later.".to_string(),
                )
            }
            RankingError::Store(detail) => {
                error!(%detail, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn parse_id(raw: &str) -> Result<CharacterId, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError(RankingError::InvalidInput(format!(
            "'{}' is not a valid character id.",
            raw
        )))
    })
}

/// Unwrap a JSON body, turning axum's plain-text rejection into the envelope
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let rejection = match payload {
        Ok(Json(body)) => return Ok(body),
        Err(rejection) => rejection,
    };

    debug!(error = %rejection.body_text(), "rejected request body");
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => "Request body must be JSON (Content-Type: application/json).",
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON.",
        JsonRejection::JsonDataError(_) => "Request body has missing or mistyped fields.",
        _ => "Request body could not be read.",
    };

    Err(ApiError(RankingError::InvalidInput(message.to_string())))
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PairQuery {
    pub gender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub character_id: Option<CharacterId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse<T> {
    pub message: String,
    #[serde(flatten)]
    pub detail: T,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/characters - Two characters to vote on, or none after a reset
async fn get_pair(State(state): State<AppState>, Query(query): Query<PairQuery>) -> ApiResult<Vec<Character>> {
    let hint = match query.gender.as_deref().map(str::trim) {
        Some(gender) if !gender.is_empty() => Some(gender.parse::<Gender>()?),
        _ => None,
    };

    let pair = state.service.get_pair(hint).await?;
    Ok(Json(ApiResponse::ok(pair.map(Vec::from).unwrap_or_default())))
}

/// PUT /api/characters - Record a vote
async fn submit_vote(
    State(state): State<AppState>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    let outcome = state.service.submit_vote(json_body(payload)?).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "status": outcome }))))
}

/// POST /api/characters - Add a character through the directory
async fn create_character(
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<MessageResponse<Character>> {
    let request = json_body(payload)?;
    let character = state.service.create(&request).await?;

    Ok(Json(ApiResponse::ok(MessageResponse {
        message: format!("{} has been added successfully!", character.name),
        detail: character,
    })))
}

/// GET /api/characters/shame - Most losses first
async fn get_bottom(State(state): State<AppState>) -> ApiResult<Vec<Character>> {
    Ok(Json(ApiResponse::ok(state.service.bottom().await?)))
}

/// GET /api/characters/top - Best win ratio first, optionally filtered
async fn get_top(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Character>> {
    let filter = TopFilter::from_params(&params)?;
    Ok(Json(ApiResponse::ok(state.service.top(filter).await?)))
}

/// GET /api/characters/count
async fn get_count(State(state): State<AppState>) -> ApiResult<CountResponse> {
    let count = state.service.count().await?;
    Ok(Json(ApiResponse::ok(CountResponse { count })))
}

/// GET /api/characters/search?name= - Case-insensitive name lookup
async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Character> {
    let name = query.name.unwrap_or_default();
    Ok(Json(ApiResponse::ok(state.service.search_by_name(&name).await?)))
}

/// GET /api/characters/:id
async fn get_character(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Character> {
    let id = parse_id(&id)?;
    Ok(Json(ApiResponse::ok(state.service.get_by_id(id).await?)))
}

/// GET /api/characters/:id/history - Audit trail, newest first
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<crate::db::Event>> {
    let id = parse_id(&id)?;
    Ok(Json(ApiResponse::ok(state.service.history(id).await?)))
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> ApiResult<crate::leaderboard::Stats> {
    Ok(Json(ApiResponse::ok(state.service.stats().await?)))
}

/// POST /api/report - Report a character; removed after too many reports
async fn report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<MessageResponse<serde_json::Value>> {
    let request = json_body(payload)?;
    let id = request.character_id.ok_or_else(|| {
        RankingError::InvalidInput("A characterId is required.".to_string())
    })?;

    let outcome = state.service.report(id).await?;

    Ok(Json(ApiResponse::ok(MessageResponse {
        message: outcome.message(),
        detail: serde_json::json!({ "deleted": outcome.is_deleted() }),
    })))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(service: RankingService) -> Router {
    let state = AppState { service };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/characters",
            get(get_pair).put(submit_vote).post(create_character),
        )
        .route("/characters/shame", get(get_bottom))
        .route("/characters/top", get(get_top))
        .route("/characters/count", get(get_count))
        .route("/characters/search", get(search))
        .route("/characters/:id", get(get_character))
        .route("/characters/:id/history", get(get_history))
        .route("/stats", get(get_stats))
        .route("/report", post(report))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
