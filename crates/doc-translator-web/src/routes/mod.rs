//! HTTP route handlers for the document translator web API.
//!
//! Every route answers JSON except the download, which streams the
//! translated file as an attachment.

mod download;
mod session;
mod translate;
mod upload;

pub use download::download;
pub use session::{delete_session, get_session};
pub use translate::{summarize, translate};
pub use upload::{replace_document, upload};

use axum::Json;
use axum::extract::State;
use doc_translator_core::{
    InstructionKind, Language, SourceFormat, Stage, TranslatedDocument, Workflow,
    target_languages,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Suggested target languages.
#[derive(Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub default: Language,
    pub languages: Vec<Language>,
}

/// Where a session stands.
#[derive(Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub stage: Stage,
    pub format: Option<SourceFormat>,
    /// Extracted text (markup for PDFs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadInfo>,
}

impl SessionStatus {
    pub fn of(session_id: &str, workflow: &Workflow) -> Self {
        Self {
            session_id: session_id.to_string(),
            stage: workflow.stage(),
            format: workflow.source_format(),
            content: workflow.extracted().map(str::to_string),
            summary: workflow.summary().map(str::to_string),
            download: workflow
                .last_translation()
                .map(|t| DownloadInfo::of(session_id, t)),
        }
    }
}

/// Metadata of the file offered at the download route.
#[derive(Serialize, Deserialize)]
pub struct DownloadInfo {
    pub kind: InstructionKind,
    pub language: Language,
    pub filename: String,
    pub mime: String,
    pub size: usize,
    pub url: String,
}

impl DownloadInfo {
    fn of(session_id: &str, translated: &TranslatedDocument) -> Self {
        Self {
            kind: translated.kind,
            language: translated.target.clone(),
            filename: translated.filename.clone(),
            mime: translated.mime().to_string(),
            size: translated.bytes().len(),
            url: format!("/api/download/{session_id}"),
        }
    }
}

/// List the offered target languages.
pub async fn languages(State(state): State<Arc<AppState>>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        default: state.config.default_target_language.clone(),
        languages: target_languages(),
    })
}
