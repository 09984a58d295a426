use std::fmt;

use lopdf::{Document, ObjectId};
use tracing::{debug, info, warn};

use super::content::interpret_page;
use super::markup::render_pages;
use super::structure::StructuredPage;
use crate::error::{Error, Result};

/// Parsed PDF, ready for structured text extraction
pub struct PdfDocument {
    doc: Document,
    /// Page object ids in page order
    page_ids: Vec<ObjectId>,
}

/// Result of walking every page of a PDF
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Colorized markup for the whole document
    pub markup: String,
    pub pages: usize,
    pub text_blocks: usize,
    /// Blocks without lines (images), skipped
    pub skipped_blocks: usize,
    /// Pages whose content stream could not be read, skipped
    pub skipped_pages: usize,
}

impl PdfDocument {
    /// Parse a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| Error::DocumentParse(format!("not a readable PDF: {e}")))?;
        let page_ids = doc.get_pages().into_values().collect();

        Ok(Self { doc, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Block/line/span tree of one page (0-based)
    pub fn structured_page(&self, page_num: usize) -> Result<StructuredPage> {
        let page_id = *self.page_ids.get(page_num).ok_or_else(|| {
            Error::DocumentParse(format!(
                "page {} out of range (document has {} pages)",
                page_num + 1,
                self.page_count()
            ))
        })?;
        interpret_page(&self.doc, page_id, page_num)
    }

    /// Structure of every readable page, plus the number of pages skipped.
    pub fn structured_pages(&self) -> (Vec<StructuredPage>, usize) {
        let mut pages = Vec::with_capacity(self.page_count());
        let mut skipped = 0;

        for page_num in 0..self.page_count() {
            match self.structured_page(page_num) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!("Skipping page {}: {e}", page_num + 1);
                    skipped += 1;
                }
            }
        }

        (pages, skipped)
    }

    /// Walk all pages and render the colorized markup.
    pub fn extract(&self) -> Extraction {
        let (pages, skipped_pages) = self.structured_pages();
        let (markup, stats) = render_pages(&pages);

        if stats.skipped_blocks > 0 {
            debug!("Skipped {} non-text blocks", stats.skipped_blocks);
        }
        info!(
            "Extracted {} lines in {} text blocks from {} pages",
            stats.lines,
            stats.text_blocks,
            self.page_count()
        );

        Extraction {
            markup,
            pages: self.page_count(),
            text_blocks: stats.text_blocks,
            skipped_blocks: stats.skipped_blocks,
            skipped_pages,
        }
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.doc.version)
            .field("page_count", &self.page_count())
            .finish_non_exhaustive()
    }
}

/// Parse `bytes` and extract the colorized markup in one step.
pub fn extract_markup(bytes: &[u8]) -> Result<String> {
    Ok(PdfDocument::from_bytes(bytes)?.extract().markup)
}
