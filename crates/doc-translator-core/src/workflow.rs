//! Session workflow: upload → (summarize) → translate → download.
//!
//! ```text
//!            upload                summarize
//!   Empty ──────────▶ Extracted ───────────▶ Summarized
//!                        │                       │
//!         translate_full │                       │ translate_summary
//!                        ▼                       ▼
//!                 TranslatedFull         TranslatedSummary
//! ```
//!
//! `upload` is accepted from every stage and starts over. `summarize` and
//! `translate_full` need a loaded document, `translate_summary` needs a
//! summary. Any failure leaves the session exactly as it was.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Language, PdfLayout};
use crate::document::{SourceFormat, UploadedDocument};
use crate::encode::{EncodedDocument, reencode};
use crate::error::{Error, Result};
use crate::extract::extract_as;
use crate::gateway::{Instruction, InstructionKind, TextTransform};

/// Download name stem for a translation of the whole document
pub const FULL_TRANSLATION_STEM: &str = "translated_content";
/// Download name stem for a translated summary
pub const SUMMARY_TRANSLATION_STEM: &str = "translated_summarized_content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Empty,
    Extracted,
    Summarized,
    TranslatedFull,
    TranslatedSummary,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Extracted => "extracted",
            Self::Summarized => "summarized",
            Self::TranslatedFull => "fully translated",
            Self::TranslatedSummary => "summary translated",
        })
    }
}

/// An upload together with what was extracted from it.
///
/// The three are set together or not at all; the format is never
/// recomputed after the upload.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: UploadedDocument,
    pub format: SourceFormat,
    pub content: String,
}

/// A rendered translation offered for download.
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub kind: InstructionKind,
    pub target: Language,
    /// Gateway output before re-encoding
    pub text: String,
    pub filename: String,
    pub encoded: EncodedDocument,
}

impl TranslatedDocument {
    pub const fn bytes(&self) -> &Bytes {
        &self.encoded.bytes
    }

    pub const fn mime(&self) -> &'static str {
        self.encoded.mime
    }
}

/// Everything one session remembers between actions.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub stage: Stage,
    pub loaded: Option<LoadedDocument>,
    pub summary: Option<String>,
    pub last_translation: Option<TranslatedDocument>,
}

/// Orchestrates one session. Methods take `&mut self`, so a session runs at
/// most one action at a time.
pub struct Workflow {
    gateway: Arc<dyn TextTransform>,
    layout: PdfLayout,
    state: SessionState,
}

impl Workflow {
    pub fn new(gateway: Arc<dyn TextTransform>, layout: PdfLayout) -> Self {
        Self {
            gateway,
            layout,
            state: SessionState::default(),
        }
    }

    /// Load a new document, replacing whatever the session held.
    pub async fn upload(&mut self, bytes: impl Into<Bytes>, mime: &str) -> Result<&LoadedDocument> {
        let document = UploadedDocument::new(bytes, mime);
        let format = SourceFormat::from_mime(mime)?;
        info!(
            "Uploading {} bytes as {format} ({})",
            document.len(),
            document.fingerprint()
        );

        // Interpreting PDF content streams is CPU-bound
        let source = document.clone();
        let content = tokio::task::spawn_blocking(move || extract_as(source.bytes(), format))
            .await
            .map_err(|e| Error::DocumentParse(format!("extraction task failed: {e}")))??;

        self.state = SessionState {
            stage: Stage::Extracted,
            loaded: Some(LoadedDocument {
                document,
                format,
                content,
            }),
            summary: None,
            last_translation: None,
        };

        self.document().ok_or_else(|| Error::DocumentParse("upload was not stored".to_string()))
    }

    /// Summarize the extracted text.
    pub async fn summarize(&mut self) -> Result<&str> {
        let loaded = self.require_document("summarize")?;

        let summary = self.gateway.transform(&loaded.content, &Instruction::Summarize).await?;
        debug!(
            "Summarized {} chars into {}",
            loaded.content.chars().count(),
            summary.chars().count()
        );

        self.state.stage = Stage::Summarized;
        Ok(self.state.summary.insert(summary).as_str())
    }

    /// Translate the whole extracted text and render it for download.
    pub async fn translate_full(&mut self, target: &Language) -> Result<&TranslatedDocument> {
        let loaded = self.require_document("translate the document")?;
        let instruction = Instruction::Translate {
            target: target.clone(),
        };

        let text = self.gateway.transform(&loaded.content, &instruction).await?;
        let translated = self.render(text, loaded.format, &instruction, target, FULL_TRANSLATION_STEM)?;

        self.state.stage = Stage::TranslatedFull;
        Ok(&*self.state.last_translation.insert(translated))
    }

    /// Translate the summary and render it for download.
    pub async fn translate_summary(&mut self, target: &Language) -> Result<&TranslatedDocument> {
        let action = "translate the summary";
        let (Some(loaded), Some(summary)) = (&self.state.loaded, &self.state.summary) else {
            return Err(self.invalid_state(action));
        };
        let instruction = Instruction::TranslateSummary {
            target: target.clone(),
        };

        let text = self.gateway.transform(summary, &instruction).await?;
        let translated = self.render(text, loaded.format, &instruction, target, SUMMARY_TRANSLATION_STEM)?;

        self.state.stage = Stage::TranslatedSummary;
        Ok(&*self.state.last_translation.insert(translated))
    }

    /// Forget the document and everything derived from it.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
    }

    pub const fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn source_format(&self) -> Option<SourceFormat> {
        self.state.loaded.as_ref().map(|l| l.format)
    }

    pub fn extracted(&self) -> Option<&str> {
        self.state.loaded.as_ref().map(|l| l.content.as_str())
    }

    pub fn summary(&self) -> Option<&str> {
        self.state.summary.as_deref()
    }

    pub const fn last_translation(&self) -> Option<&TranslatedDocument> {
        self.state.last_translation.as_ref()
    }

    pub const fn document(&self) -> Option<&LoadedDocument> {
        self.state.loaded.as_ref()
    }

    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn gateway(&self) -> &dyn TextTransform {
        self.gateway.as_ref()
    }

    /// Loaded document with some text to work on.
    fn require_document(&self, action: &'static str) -> Result<&LoadedDocument> {
        let loaded = self.state.loaded.as_ref().ok_or_else(|| self.invalid_state(action))?;
        if loaded.content.trim().is_empty() {
            return Err(Error::InvalidState {
                action,
                stage: format!("{} with no text", self.state.stage),
            });
        }
        Ok(loaded)
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            action,
            stage: self.state.stage.to_string(),
        }
    }

    fn render(
        &self,
        text: String,
        format: SourceFormat,
        instruction: &Instruction,
        target: &Language,
        stem: &str,
    ) -> Result<TranslatedDocument> {
        let encoded = reencode(&text, format, &self.layout)?;
        let filename = encoded.filename(stem);
        info!(
            "{} to {target} ready as {filename} ({} bytes)",
            instruction.kind(),
            encoded.bytes.len()
        );

        Ok(TranslatedDocument {
            kind: instruction.kind(),
            target: target.clone(),
            text,
            filename,
            encoded,
        })
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("gateway", &self.gateway.name())
            .field("stage", &self.state.stage)
            .field("format", &self.source_format())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::gateway::GatewayInfo;

    /// Echoes the text back, tagged with the instruction kind
    struct EchoGateway;

    #[async_trait]
    impl TextTransform for EchoGateway {
        fn info(&self) -> GatewayInfo {
            GatewayInfo {
                name: "echo",
                model: "echo".to_string(),
            }
        }

        async fn transform(&self, text: &str, instruction: &Instruction) -> Result<String> {
            Ok(format!("[{}] {text}", instruction.kind()))
        }
    }

    fn workflow() -> Workflow {
        Workflow::new(Arc::new(EchoGateway), PdfLayout::default())
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let mut wf = workflow();
        assert_eq!(wf.stage(), Stage::Empty);
        assert!(matches!(
            wf.summarize().await,
            Err(Error::InvalidState { action: "summarize", .. })
        ));
        assert!(matches!(
            wf.translate_full(&"French".into()).await,
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_full_path() {
        let mut wf = workflow();
        wf.upload(b"Hello".to_vec(), "text/plain").await.unwrap();
        assert_eq!(wf.stage(), Stage::Extracted);
        assert_eq!(wf.extracted(), Some("Hello"));

        let translated = wf.translate_full(&"French".into()).await.unwrap();
        assert_eq!(translated.filename, "translated_content.txt");
        assert_eq!(translated.text, "[translate] Hello");
        assert_eq!(wf.stage(), Stage::TranslatedFull);
    }

    #[tokio::test]
    async fn test_summary_path() {
        let mut wf = workflow();
        wf.upload(b"# Notes".to_vec(), "text/markdown").await.unwrap();
        assert_eq!(wf.summarize().await.unwrap(), "[summarize] # Notes");
        assert_eq!(wf.stage(), Stage::Summarized);

        let translated = wf.translate_summary(&"Hindi".into()).await.unwrap();
        assert_eq!(translated.filename, "translated_summarized_content.md");
        assert_eq!(translated.mime(), "text/markdown");
        assert_eq!(translated.text, "[translate summary] [summarize] # Notes");
        assert_eq!(wf.stage(), Stage::TranslatedSummary);
    }

    #[tokio::test]
    async fn test_empty_document_cannot_be_processed() {
        let mut wf = workflow();
        wf.upload(b"  \n".to_vec(), "text/plain").await.unwrap();
        let err = wf.summarize().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot summarize while the workflow is extracted with no text"
        );
        assert_eq!(wf.stage(), Stage::Extracted);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_state() {
        let mut wf = workflow();
        wf.upload(b"keep me".to_vec(), "text/plain").await.unwrap();
        wf.summarize().await.unwrap();

        assert!(wf.upload(b"img".to_vec(), "image/png").await.is_err());
        assert!(wf.upload(vec![0xff, 0xfe], "text/plain").await.is_err());

        assert_eq!(wf.stage(), Stage::Summarized);
        assert_eq!(wf.extracted(), Some("keep me"));
        assert!(wf.summary().is_some());
    }

    #[tokio::test]
    async fn test_upload_extracts_every_format() {
        let mut wf = workflow();
        let pdf = crate::pdf::PdfWriter::new(PdfLayout::default()).write("Bonjour").unwrap();

        let loaded = wf.upload(pdf, "application/pdf").await.unwrap();
        assert_eq!(loaded.format, SourceFormat::Pdf);
        assert_eq!(loaded.content, "<span style=\"color:#000000;\">Bonjour</span><br>");

        let loaded = wf.upload(b"*hi*".to_vec(), "text/markdown").await.unwrap();
        assert_eq!(loaded.format, SourceFormat::Markdown);
        assert_eq!(loaded.content, "*hi*");

        let err = wf.upload(vec![0xc3, 0x28], "text/markdown").await.unwrap_err();
        assert!(matches!(err, Error::DocumentParse(_)));
        assert_eq!(wf.extracted(), Some("*hi*"));
    }

    #[tokio::test]
    async fn test_reset() {
        let mut wf = workflow();
        wf.upload(b"text".to_vec(), "text/plain").await.unwrap();
        wf.reset();
        assert_eq!(wf.stage(), Stage::Empty);
        assert!(wf.document().is_none());
    }
}
