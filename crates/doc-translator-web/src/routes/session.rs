//! Session routes - status and teardown.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;

use super::SessionStatus;
use crate::helpers::{OptionExt, RouteResult};
use crate::state::AppState;

/// Report the session's stage, extracted text, summary and download.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Json<SessionStatus>> {
    let workflow = state.lock_session(&session_id).await?;
    Ok(Json(SessionStatus::of(&session_id, &workflow)))
}

/// Drop the session and everything it holds.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<StatusCode> {
    state
        .remove_session(&session_id)
        .await
        .then_some(())
        .or_not_found("Session not found")?;
    info!("Deleted session {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}
