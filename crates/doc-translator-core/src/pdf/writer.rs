//! Plain-text PDF synthesis.
//!
//! Text that `WinAnsiEncoding` can represent is set in the standard Helvetica
//! font, so no font program is embedded. Anything else switches the whole
//! document to embedded TrueType fonts (see [`super::font`]), picking for
//! each character the first font in the chain that has a glyph for it.
//! Characters no available font covers are written as `?`.
//!
//! # Layout
//!
//! PDF uses a bottom-left origin; the first baseline sits one font size
//! below the top margin and every following line moves down by the line
//! height (`TL` / `T*`). Paragraphs are word-wrapped against the advance
//! widths of the chosen fonts and paginated once a page is full.

use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, StringFormat, Stream};
use tracing::{debug, warn};

use super::encoding::win_ansi_encode;
use super::font::{EmbeddedFont, Typeface, resolve_fonts};
use crate::config::PdfLayout;
use crate::error::{Error, Result};

const REPLACEMENT: char = '?';

/// Helvetica advance widths for 0x20..=0x7E, in thousandths of an em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];
/// Used for everything outside printable ASCII
const HELVETICA_DEFAULT_WIDTH: u16 = 556;

fn helvetica_width(c: char, font_size: f32) -> f32 {
    let units = match u32::from(c) {
        code @ 0x20..=0x7E => HELVETICA_WIDTHS[(code - 0x20) as usize],
        _ => HELVETICA_DEFAULT_WIDTH,
    };
    f32::from(units) / 1000.0 * font_size
}

/// Word wrap one paragraph to `max_width` points.
///
/// Words wider than a whole line are split between characters. An empty
/// paragraph yields one empty line so blank lines survive.
fn word_wrap(text: &str, max_width: f32, char_width: impl Fn(char) -> f32) -> Vec<String> {
    let text_width = |s: &str| -> f32 { s.chars().map(&char_width).sum() };
    let mut lines = Vec::new();
    let mut current_line = String::new();
    let space = char_width(' ');

    for word in text.split_whitespace() {
        let word_width = text_width(word);

        if word_width > max_width {
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }
            let mut chunk = String::new();
            for c in word.chars() {
                if !chunk.is_empty() && text_width(&chunk) + char_width(c) > max_width {
                    lines.push(std::mem::take(&mut chunk));
                }
                chunk.push(c);
            }
            current_line = chunk;
        } else if current_line.is_empty() {
            current_line = word.to_string();
        } else if text_width(&current_line) + space + word_width <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// WinAnsi bytes for `text`, plus how many characters had to be replaced.
fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|c| {
            win_ansi_encode(c).unwrap_or_else(|| {
                replaced += 1;
                b'?'
            })
        })
        .collect();
    (bytes, replaced)
}

fn needs_embedded_fonts(text: &str) -> bool {
    text.chars()
        .any(|c| !matches!(c, '\n' | '\r') && win_ansi_encode(c).is_none())
}

fn resource_name(font: usize) -> String {
    format!("F{}", font + 1)
}

/// A stretch of one line shown with a single font
#[derive(Debug, PartialEq)]
struct Run {
    font: usize,
    bytes: Vec<u8>,
}

/// Fonts a document is typeset with.
enum FontSet<'a> {
    /// Standard Helvetica, one WinAnsi byte per character
    Standard,
    /// Embedded TrueType fonts in fallback order, two-byte glyph ids
    Embedded(Vec<Typeface<'a>>),
}

/// First font with a glyph for `c`.
fn locate(faces: &[Typeface<'_>], c: char) -> Option<(usize, u16)> {
    faces
        .iter()
        .enumerate()
        .find_map(|(i, face)| face.glyph(c).map(|gid| (i, gid)))
}

/// Stand-in for characters no font covers: `?` from the first font, else `.notdef`.
fn replacement(faces: &[Typeface<'_>]) -> (usize, u16, Option<char>) {
    faces
        .first()
        .and_then(|face| face.glyph(REPLACEMENT))
        .map_or((0, 0, None), |gid| (0, gid, Some(REPLACEMENT)))
}

impl FontSet<'_> {
    fn char_width(&self, c: char, font_size: f32) -> f32 {
        match self {
            Self::Standard => helvetica_width(c, font_size),
            Self::Embedded(faces) => {
                let (font, gid) = locate(faces, c).unwrap_or_else(|| {
                    let (font, gid, _) = replacement(faces);
                    (font, gid)
                });
                faces.get(font).map_or(0.0, |face| face.advance(gid, font_size))
            }
        }
    }

    /// Split a line into per-font runs, recording the glyphs used.
    /// Also returns how many characters had to be replaced.
    fn encode_line(&mut self, line: &str) -> (Vec<Run>, usize) {
        match self {
            Self::Standard => {
                let (bytes, replaced) = encode_win_ansi(line);
                (vec![Run { font: 0, bytes }], replaced)
            }
            Self::Embedded(faces) => {
                let mut runs: Vec<Run> = Vec::new();
                let mut replaced = 0;
                for c in line.chars() {
                    // Spaces stay in the current font so runs are not split at every word
                    let current = runs
                        .last()
                        .filter(|_| c.is_whitespace())
                        .and_then(|run| Some((run.font, faces.get(run.font)?.glyph(c)?)));
                    let (font, gid, source) = current.or_else(|| locate(faces, c)).map_or_else(
                        || {
                            replaced += 1;
                            replacement(faces)
                        },
                        |(font, gid)| (font, gid, Some(c)),
                    );
                    if let Some(face) = faces.get_mut(font) {
                        face.record(gid, source);
                    }
                    match runs.last_mut() {
                        Some(run) if run.font == font => run.bytes.extend_from_slice(&gid.to_be_bytes()),
                        _ => runs.push(Run {
                            font,
                            bytes: gid.to_be_bytes().to_vec(),
                        }),
                    }
                }
                (runs, replaced)
            }
        }
    }

    fn string(&self, bytes: Vec<u8>) -> Object {
        match self {
            Self::Standard => Object::string_literal(bytes),
            Self::Embedded(_) => Object::String(bytes, StringFormat::Hexadecimal),
        }
    }

    /// Add the fonts that were used to `doc`; returns the `/Font` resources.
    fn install(&self, doc: &mut Document) -> Result<Dictionary> {
        let mut fonts = Dictionary::new();
        match self {
            Self::Standard => {
                let font_id = doc.add_object(Dictionary::from_iter([
                    ("Type", Object::Name(b"Font".to_vec())),
                    ("Subtype", Object::Name(b"Type1".to_vec())),
                    ("BaseFont", Object::Name(b"Helvetica".to_vec())),
                    ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
                ]));
                fonts.set(resource_name(0), Object::Reference(font_id));
            }
            Self::Embedded(faces) => {
                for (i, face) in faces.iter().enumerate().filter(|(_, face)| face.is_used()) {
                    fonts.set(resource_name(i), Object::Reference(face.embed(doc)?));
                }
            }
        }
        Ok(fonts)
    }
}

/// Writes plain text into a fresh multi-page PDF.
#[derive(Debug, Clone)]
pub struct PdfWriter {
    layout: PdfLayout,
    /// Overrides the chain resolved from the layout
    fonts: Option<Vec<Arc<EmbeddedFont>>>,
}

impl PdfWriter {
    pub const fn new(layout: PdfLayout) -> Self {
        Self { layout, fonts: None }
    }

    /// Use exactly these fonts for text Helvetica cannot encode.
    ///
    /// An empty list keeps everything in Helvetica.
    #[must_use]
    pub fn with_fonts(mut self, fonts: Vec<Arc<EmbeddedFont>>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    fn font_chain(&self) -> Result<Vec<Arc<EmbeddedFont>>> {
        match &self.fonts {
            Some(fonts) => Ok(fonts.clone()),
            None => resolve_fonts(&self.layout.fonts),
        }
    }

    /// Lay `text` out on as many pages as needed and serialize the PDF.
    pub fn write(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Encode("no text to write into the PDF".to_string()));
        }

        let layout = &self.layout;
        let text = text.replace('\t', "    ");

        let chain = if needs_embedded_fonts(&text) {
            self.font_chain()?
        } else {
            Vec::new()
        };
        let faces = chain
            .iter()
            .map(|font| Typeface::new(font))
            .collect::<Result<Vec<_>>>()?;
        let mut fonts = if faces.is_empty() {
            FontSet::Standard
        } else {
            debug!("Typesetting with {} embedded fonts", faces.len());
            FontSet::Embedded(faces)
        };

        let lines: Vec<String> = text
            .lines()
            .flat_map(|paragraph| {
                word_wrap(paragraph, layout.printable_width(), |c| {
                    fonts.char_width(c, layout.font_size)
                })
            })
            .collect();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lines_per_page = ((layout.printable_height() / layout.line_height()).floor() as usize).max(1);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        // Filled in once the pages show which fonts were used
        let resources_id = doc.new_object_id();

        let mut kids = Vec::new();
        let mut replaced = 0;
        for page_lines in lines.chunks(lines_per_page) {
            let (operations, page_replaced) = self.page_operations(page_lines, &mut fonts);
            replaced += page_replaced;

            let content = Content { operations }
                .encode()
                .map_err(|e| Error::Encode(format!("failed to encode page content: {e}")))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Reference(resources_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        if replaced > 0 {
            match fonts {
                FontSet::Standard => {
                    warn!("{replaced} characters have no WinAnsi code and no font covers them; written as '?'");
                }
                FontSet::Embedded(_) => {
                    warn!("{replaced} characters are not covered by any available font; written as '?'");
                }
            }
        }

        let font_resources = fonts.install(&mut doc)?;
        doc.objects.insert(
            resources_id,
            Object::Dictionary(Dictionary::from_iter([("Font", Object::Dictionary(font_resources))])),
        );

        let page_count = i64::try_from(kids.len())
            .map_err(|_| Error::Encode("too many pages".to_string()))?;
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_count)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    Object::Real(layout.page_width),
                    Object::Real(layout.page_height),
                ]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::Encode(format!("failed to save PDF: {e}")))?;

        debug!("Wrote {} lines on {page_count} pages ({} bytes)", lines.len(), output.len());
        Ok(output)
    }

    fn page_operations(&self, lines: &[String], fonts: &mut FontSet<'_>) -> (Vec<Operation>, usize) {
        let layout = &self.layout;
        let top_baseline = layout.page_height - layout.margin - layout.font_size;
        let mut replaced = 0;
        // Selected lazily so pages never name a font that ends up unembedded
        let mut current_font = None;

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("TL", vec![Object::Real(layout.line_height())]),
            Operation::new("Td", vec![Object::Real(layout.margin), Object::Real(top_baseline)]),
        ];

        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            if line.is_empty() {
                continue;
            }
            let (runs, line_replaced) = fonts.encode_line(line);
            replaced += line_replaced;
            for run in runs {
                if current_font != Some(run.font) {
                    operations.push(Operation::new(
                        "Tf",
                        vec![
                            Object::Name(resource_name(run.font).into_bytes()),
                            Object::Real(layout.font_size),
                        ],
                    ));
                    current_font = Some(run.font);
                }
                operations.push(Operation::new("Tj", vec![fonts.string(run.bytes)]));
            }
        }

        operations.push(Operation::new("ET", vec![]));
        (operations, replaced)
    }
}
