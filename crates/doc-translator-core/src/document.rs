//! Uploaded documents and the format tag remembered for re-encoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Document type of an upload, fixed when the upload is first extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    Markdown,
    PlainText,
}

impl SourceFormat {
    /// Map a declared MIME type to a format.
    ///
    /// Parameters such as `; charset=utf-8` are ignored and the comparison is
    /// case-insensitive. Unknown types are rejected rather than treated as text.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            "text/markdown" | "text/x-markdown" => Ok(Self::Markdown),
            "text/plain" => Ok(Self::PlainText),
            _ => Err(Error::UnsupportedFormat(mime.to_string())),
        }
    }

    /// MIME label offered with downloads
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
        }
    }

    /// File extension (without the dot)
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "md",
            Self::PlainText => "txt",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pdf => "PDF",
            Self::Markdown => "Markdown",
            Self::PlainText => "plain text",
        };
        f.write_str(name)
    }
}

/// Raw upload as received at the boundary. Immutable once created.
#[derive(Clone)]
pub struct UploadedDocument {
    bytes: Bytes,
    declared_mime: String,
    /// Content fingerprint (MD5 hex), computed once on upload
    fingerprint: String,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Bytes>, declared_mime: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let fingerprint = format!("{:x}", md5::compute(&bytes));
        Self {
            bytes,
            declared_mime: declared_mime.into(),
            fingerprint,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_mime(&self) -> &str {
        &self.declared_mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Short identifier for log lines; never used for persistence.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl std::fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("declared_mime", &self.declared_mime)
            .field("bytes_len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
