mod cmap;
mod content;
mod document;
mod encoding;
mod font;
mod fonts;
pub mod markup;
mod structure;
mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::{Extraction, PdfDocument, extract_markup};
pub use font::{EmbeddedFont, system_fonts};
pub use structure::{Block, Color, Line, Span, StructuredPage};
pub use writer::PdfWriter;
