//! Upload routes - multipart document upload handling.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

use super::SessionStatus;
use crate::helpers::{ResultExt, RouteResult, WorkflowResultExt};
use crate::state::AppState;

/// File part of an upload form.
struct UploadedFile {
    filename: String,
    mime: String,
    data: Bytes,
}

/// Declared content type of the part, else a guess from the file name.
fn resolve_mime(content_type: Option<&str>, filename: &str) -> String {
    match content_type.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

async fn read_file(mut multipart: Multipart) -> RouteResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await.or_bad_request()? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document").to_string();
        let mime = resolve_mime(field.content_type(), &filename);
        let data = field.bytes().await.or_bad_request()?;

        return Ok(UploadedFile {
            filename,
            mime,
            data,
        });
    }

    Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))
}

/// Upload a document into a new session.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> RouteResult<(StatusCode, Json<SessionStatus>)> {
    let file = read_file(multipart).await?;

    // Extract before registering so a bad upload leaves no session behind
    let mut workflow = state.new_workflow();
    workflow.upload(file.data, &file.mime).await.or_status()?;

    let format = workflow.source_format();
    let session_id = state.create_session(workflow).await.to_string();
    info!(
        "Created session {} for {} ({:?})",
        session_id, file.filename, format
    );

    let workflow = state.lock_session(&session_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionStatus::of(&session_id, &workflow)),
    ))
}

/// Replace the document of an existing session, discarding its summary and
/// translation.
pub async fn replace_document(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> RouteResult<Json<SessionStatus>> {
    let mut workflow = state.lock_session(&session_id).await?;
    let file = read_file(multipart).await?;

    workflow.upload(file.data, &file.mime).await.or_status()?;
    info!("Session {} now holds {}", session_id, file.filename);

    Ok(Json(SessionStatus::of(&session_id, &workflow)))
}
