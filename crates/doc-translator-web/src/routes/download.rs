//! Download route - the last translation as an attachment.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use std::sync::Arc;

use crate::helpers::{ResultExt, RouteResult};
use crate::state::AppState;

/// Download the most recent translation in the uploaded format.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    // Copy out under the lock; the bytes are reference counted
    let (bytes, mime, filename) = {
        let workflow = state.lock_session(&session_id).await?;
        let translated = workflow.last_translation().ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "Nothing translated yet".to_string(),
            )
        })?;
        (
            translated.bytes().clone(),
            translated.mime(),
            translated.filename.clone(),
        )
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .or_internal_error()
}
