//! Upload → working text.

use tracing::debug;

use crate::document::{SourceFormat, UploadedDocument};
use crate::error::{Error, Result};
use crate::pdf::PdfDocument;

/// Working text of an upload, tagged with the format it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub format: SourceFormat,
    /// Colorized markup for PDFs, the decoded text otherwise
    pub content: String,
}

/// Decode `bytes` as `format`.
///
/// Text and Markdown are taken verbatim after UTF-8 decoding; PDFs go
/// through the structured extractor.
pub fn extract_as(bytes: &[u8], format: SourceFormat) -> Result<String> {
    match format {
        SourceFormat::Pdf => {
            let extraction = PdfDocument::from_bytes(bytes)?.extract();
            if extraction.skipped_pages > 0 {
                debug!(
                    "{} of {} pages could not be read",
                    extraction.skipped_pages, extraction.pages
                );
            }
            Ok(extraction.markup)
        }
        SourceFormat::Markdown | SourceFormat::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::DocumentParse(format!("{format} upload is not valid UTF-8: {e}"))),
    }
}

/// Determine the format from the declared MIME type and extract the text.
pub fn extract(document: &UploadedDocument) -> Result<ExtractedText> {
    let format = SourceFormat::from_mime(document.declared_mime())?;
    let content = extract_as(document.bytes(), format)?;
    debug!(
        "Extracted {} chars from {format} upload {}",
        content.chars().count(),
        document.fingerprint()
    );
    Ok(ExtractedText { format, content })
}
