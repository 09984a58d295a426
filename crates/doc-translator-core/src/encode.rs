//! Translated text → download in the upload's format.

use bytes::Bytes;
use tracing::debug;

use crate::config::PdfLayout;
use crate::document::SourceFormat;
use crate::error::Result;
use crate::pdf::{PdfWriter, markup};

/// Bytes ready to offer for download.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    pub bytes: Bytes,
    pub mime: &'static str,
    /// Without the dot
    pub extension: &'static str,
}

impl EncodedDocument {
    /// `{stem}.{extension}`
    pub fn filename(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension)
    }
}

impl std::fmt::Debug for EncodedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedDocument")
            .field("mime", &self.mime)
            .field("extension", &self.extension)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// Re-encode `text` in `format`.
///
/// Text and Markdown are written back verbatim as UTF-8. PDFs are
/// synthesized from plain text: markup (from a PDF upload that was
/// translated with its tags) is flattened first, and no coloring is
/// reproduced.
pub fn reencode(text: &str, format: SourceFormat, layout: &PdfLayout) -> Result<EncodedDocument> {
    let bytes = match format {
        SourceFormat::PlainText | SourceFormat::Markdown => Bytes::from(text.to_owned()),
        SourceFormat::Pdf => {
            let plain = if markup::is_markup(text) {
                markup::to_plain_text(text)
            } else {
                text.to_owned()
            };
            Bytes::from(PdfWriter::new(layout.clone()).write(&plain)?)
        }
    };
    debug!("Re-encoded {} chars as {format} ({} bytes)", text.chars().count(), bytes.len());

    Ok(EncodedDocument {
        bytes,
        mime: format.mime(),
        extension: format.extension(),
    })
}
