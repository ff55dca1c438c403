//! Session Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{SessionOrder, SessionRecord, SessionSummary, StorageError};
use thiserror::Error;
use tracing::error;

use crate::AppState;

/// Route errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Storage(e) => {
                error!("Session query failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Query parameters for the sessions endpoint
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub username: String,
    /// `latest` (default) or `oldest`
    #[serde(default)]
    pub order: SessionOrder,
}

/// Response for the sessions endpoint
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub username: String,
    pub data: Vec<SessionSummary>,
    pub count: usize,
}

/// Response for a single session
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub summary: SessionSummary,
    pub session: SessionRecord,
}

/// List a user's sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let username = params.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }

    let data: Vec<_> = state
        .store
        .sessions_for(username, params.order)
        .await?
        .iter()
        .map(SessionRecord::summary)
        .collect();

    Ok(Json(SessionListResponse {
        username: username.to_string(),
        count: data.len(),
        data,
    }))
}

/// One session with its metric rows
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((username, session_id)): Path<(String, String)>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = state.store.session(&username, &session_id).await?;
    Ok(Json(SessionDetailResponse {
        summary: session.summary(),
        session,
    }))
}
