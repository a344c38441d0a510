//! JSON HTTP API over the matchmaking engine and registry
//!
//! Failures render as `{"error": {"code", "message"}}`. Empty results are
//! ordinary 200 responses with empty lists.

use crate::error::MatchmakingError;
use crate::registry::User;
use crate::service::app::AppState;
use crate::types::{CompatibilityReport, GameOwnership, LibraryStats, LocalId, OwnedGame};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Error rendered to API clients
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<MatchmakingError>() {
            Some(MatchmakingError::NotRegistered { local_id }) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_REGISTERED",
                format!("User {} is not registered, register first", local_id),
            ),
            Some(e @ MatchmakingError::UpstreamUnavailable { .. }) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "UPSTREAM_UNAVAILABLE",
                e.to_string(),
            ),
            Some(e @ MatchmakingError::InvalidRequest { .. }) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
            }
            Some(e @ MatchmakingError::HandleNotFound { .. }) => {
                Self::new(StatusCode::NOT_FOUND, "HANDLE_NOT_FOUND", e.to_string())
            }
            Some(e @ MatchmakingError::PlatformIdInUse { .. }) => {
                Self::new(StatusCode::CONFLICT, "PLATFORM_ID_IN_USE", e.to_string())
            }
            _ => {
                error!("Unhandled API error: {:#}", err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub local_id: LocalId,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonGamesRequest {
    pub users: Vec<LocalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonGamesResponse {
    pub count: usize,
    pub games: Vec<OwnedGame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityQuery {
    pub user: LocalId,
    pub other: LocalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesRequest {
    pub user: LocalId,
    pub candidates: Vec<LocalId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One ranked candidate with rounded figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEntry {
    pub local_id: LocalId,
    #[serde(flatten)]
    pub report: CompatibilityReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnersRequest {
    pub title: String,
    pub candidates: Vec<LocalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnersResponse {
    pub owners: Vec<GameOwnership>,
}

/// Build the `/api/v1` router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/users", post(register_user))
        .route(
            "/api/v1/users/{local_id}",
            get(get_user).delete(unregister_user),
        )
        .route("/api/v1/users/{local_id}/stats", get(library_stats))
        .route("/api/v1/common-games", post(common_games))
        .route("/api/v1/compatibility", get(compatibility))
        .route("/api/v1/matches", post(best_matches))
        .route("/api/v1/owners", post(find_owners))
        .with_state(state)
}

/// Record the request outcome and pass the result through
fn finish<T>(state: &AppState, operation: &str, result: ApiResult<T>) -> ApiResult<T> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status,
    };
    state.metrics().record_api_request(operation, status.as_u16());
    result
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    debug!("Register request for user {}", request.local_id);

    let result = state
        .register_user(
            request.local_id,
            &request.handle,
            request.display_name.as_deref(),
        )
        .await
        .map(|user| (StatusCode::CREATED, Json(user)))
        .map_err(ApiError::from);

    finish(&state, "register_user", result)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<LocalId>,
) -> ApiResult<Json<User>> {
    let result = match state.registry().get_user(local_id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::from(anyhow::Error::from(
            MatchmakingError::NotRegistered { local_id },
        ))),
        Err(e) => Err(ApiError::from(e)),
    };

    finish(&state, "get_user", result)
}

async fn unregister_user(
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<LocalId>,
) -> ApiResult<StatusCode> {
    let result = match state.registry().unregister_user(local_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(ApiError::from(anyhow::Error::from(
            MatchmakingError::NotRegistered { local_id },
        ))),
        Err(e) => Err(ApiError::from(e)),
    };

    finish(&state, "unregister_user", result)
}

async fn library_stats(
    State(state): State<Arc<AppState>>,
    Path(local_id): Path<LocalId>,
) -> ApiResult<Json<LibraryStats>> {
    let result = state
        .engine()
        .library_stats(local_id)
        .await
        .map(Json)
        .map_err(ApiError::from);

    finish(&state, "library_stats", result)
}

async fn common_games(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommonGamesRequest>,
) -> ApiResult<Json<CommonGamesResponse>> {
    let result = state
        .engine()
        .common_games(&request.users)
        .await
        .map(|games| {
            Json(CommonGamesResponse {
                count: games.len(),
                games,
            })
        })
        .map_err(ApiError::from);

    finish(&state, "common_games", result)
}

async fn compatibility(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompatibilityQuery>,
) -> ApiResult<Json<CompatibilityReport>> {
    let result = state
        .engine()
        .compatibility(query.user, query.other)
        .await
        .map(|result| Json(result.report()))
        .map_err(ApiError::from);

    finish(&state, "compatibility", result)
}

async fn best_matches(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchesRequest>,
) -> ApiResult<Json<MatchesResponse>> {
    let result = state
        .engine()
        .find_best_matches(request.user, &request.candidates, request.limit)
        .await
        .map(|matches| {
            Json(MatchesResponse {
                matches: matches
                    .into_iter()
                    .map(|m| MatchEntry {
                        local_id: m.local_id,
                        report: m.result.report(),
                    })
                    .collect(),
            })
        })
        .map_err(ApiError::from);

    finish(&state, "best_matches", result)
}

async fn find_owners(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OwnersRequest>,
) -> ApiResult<Json<OwnersResponse>> {
    let result = state
        .engine()
        .find_players_for_game(&request.title, &request.candidates)
        .await
        .map(|owners| Json(OwnersResponse { owners }))
        .map_err(ApiError::from);

    finish(&state, "find_owners", result)
}
