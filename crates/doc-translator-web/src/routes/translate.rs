//! Processing routes - summarize and translate.

use axum::{
    Json,
    extract::{Path, State},
};
use doc_translator_core::{InstructionKind, Language, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::DownloadInfo;
use crate::helpers::{RouteResult, WorkflowResultExt};
use crate::state::AppState;

/// What to translate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The whole extracted text
    #[default]
    Full,
    /// The summary produced by the summarize route
    Summary,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    /// Target language (default: the configured default)
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub scope: Scope,
}

#[derive(Serialize, Deserialize)]
pub struct SummaryResponse {
    pub session_id: String,
    pub stage: Stage,
    pub summary: String,
}

#[derive(Serialize, Deserialize)]
pub struct TranslateResponse {
    pub session_id: String,
    pub stage: Stage,
    pub kind: InstructionKind,
    /// Model output before re-encoding
    pub text: String,
    pub download: DownloadInfo,
}

/// Summarize the session's document.
pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Json<SummaryResponse>> {
    let mut workflow = state.lock_session(&session_id).await?;
    let summary = workflow.summarize().await.or_status()?.to_string();

    Ok(Json(SummaryResponse {
        session_id,
        stage: workflow.stage(),
        summary,
    }))
}

/// Translate the document or its summary.
pub async fn translate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<TranslateRequest>,
) -> RouteResult<Json<TranslateResponse>> {
    let target = request
        .language
        .filter(|l| !l.trim().is_empty())
        .map_or_else(
            || state.config.default_target_language.clone(),
            |l| Language::new(l.trim()),
        );
    debug!("translate {:?} to {} in session {}", request.scope, target, session_id);

    let mut workflow = state.lock_session(&session_id).await?;
    let translated = match request.scope {
        Scope::Full => workflow.translate_full(&target).await,
        Scope::Summary => workflow.translate_summary(&target).await,
    }
    .or_status()?;

    let kind = translated.kind;
    let text = translated.text.clone();
    let download = DownloadInfo::of(&session_id, translated);

    Ok(Json(TranslateResponse {
        stage: workflow.stage(),
        session_id,
        kind,
        text,
        download,
    }))
}
