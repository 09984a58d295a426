//! Turning shown string bytes back into text, per font resource.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

use super::cmap::ToUnicodeCMap;
use super::encoding::win_ansi_decode;

/// Resolve one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve an object to a dictionary (stream dictionaries included).
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Plain (decoded) bytes of a stream.
pub(crate) fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Numeric operand or dictionary value.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Name entry as an owned string.
pub(crate) fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontKind {
    /// Single-byte codes (Type1, TrueType, Type3)
    Simple,
    /// Type0 with multi-byte CIDs
    Composite,
}

/// Glyph widths in thousandths of text space units.
#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    Composite {
        default: f32,
        widths: HashMap<u32, f32>,
    },
}

/// Width assumed for standard fonts that ship without a `Widths` array
const FALLBACK_SIMPLE_WIDTH: f32 = 500.0;
const FALLBACK_CID_WIDTH: f32 = 1000.0;
/// Upper bound on explicit entries taken from a CIDFont `W` array.
const MAX_CID_WIDTHS: usize = 0x1_0000;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
impl Widths {
    fn simple(doc: &Document, font: &Dictionary) -> Self {
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map_or(0, |n| n.max(0.0) as u32);
        let widths = font
            .get(b"Widths")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .map(|arr| arr.iter().map(|w| number(resolve(doc, w)).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let missing = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
            .and_then(|desc| desc.get(b"MissingWidth").ok())
            .and_then(number)
            .unwrap_or(FALLBACK_SIMPLE_WIDTH);

        Self::Simple {
            first_char,
            widths,
            missing,
        }
    }

    fn composite(doc: &Document, font: &Dictionary) -> Self {
        let descendant = font
            .get(b"DescendantFonts")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|obj| resolve_dict(doc, obj));

        let Some(cid_font) = descendant else {
            return Self::Composite {
                default: FALLBACK_CID_WIDTH,
                widths: HashMap::new(),
            };
        };

        let default = cid_font
            .get(b"DW")
            .ok()
            .and_then(number)
            .unwrap_or(FALLBACK_CID_WIDTH);
        let entries: Vec<&Object> = cid_font
            .get(b"W")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .map(|arr| arr.iter().map(|o| resolve(doc, o)).collect())
            .unwrap_or_default();

        // W is a sequence of `c [w1 w2 ...]` and `c_first c_last w` groups
        let mut widths = HashMap::new();
        let mut i = 0;
        while i < entries.len() && widths.len() < MAX_CID_WIDTHS {
            let Some(start) = number(entries[i]).map(|n| n.max(0.0) as u32) else {
                break;
            };
            match entries.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (offset, w) in (0u32..).zip(list) {
                        let Some(code) = start.checked_add(offset) else {
                            break;
                        };
                        if widths.len() >= MAX_CID_WIDTHS {
                            break;
                        }
                        if let Some(w) = number(resolve(doc, w)) {
                            widths.insert(code, w);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = number(end).map_or(start, |n| n.max(0.0) as u32);
                    let w = entries.get(i + 2).and_then(|o| number(o)).unwrap_or(default);
                    let room = MAX_CID_WIDTHS - widths.len();
                    for code in (start..=end.min(start.saturating_add(0xFFFF))).take(room) {
                        widths.insert(code, w);
                    }
                    i += 3;
                }
                None => break,
            }
        }

        Self::Composite { default, widths }
    }

    fn get(&self, code: u32) -> f32 {
        match self {
            Self::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .filter(|w| *w > 0.0)
                .unwrap_or(*missing),
            Self::Composite { default, widths } => widths.get(&code).copied().unwrap_or(*default),
        }
    }
}

/// One shown glyph: its width in text space units (unscaled) and whether it
/// is the single-byte space that word spacing applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub width: f32,
    pub is_space: bool,
}

/// Decoder for strings shown with one font resource.
#[derive(Debug, Clone)]
pub struct FontDecoder {
    kind: FontKind,
    to_unicode: Option<ToUnicodeCMap>,
    widths: Widths,
}

impl Default for FontDecoder {
    fn default() -> Self {
        Self::simple()
    }
}

impl FontDecoder {
    /// Decoder for a font we could not look up: treat bytes as WinAnsi.
    pub fn simple() -> Self {
        Self {
            kind: FontKind::Simple,
            to_unicode: None,
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: FALLBACK_SIMPLE_WIDTH,
            },
        }
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let kind = match name_of(font, b"Subtype").as_deref() {
            Some("Type0") => FontKind::Composite,
            _ => FontKind::Simple,
        };

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| match obj {
                Object::Stream(stream) => stream_bytes(stream),
                _ => None,
            })
            .map(|data| ToUnicodeCMap::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        if to_unicode.is_none() && kind == FontKind::Composite {
            debug!(
                "Composite font {:?} has no ToUnicode map, reading codes as UTF-16",
                name_of(font, b"BaseFont")
            );
        }

        let widths = match kind {
            FontKind::Simple => Widths::simple(doc, font),
            FontKind::Composite => Widths::composite(doc, font),
        };

        Self {
            kind,
            to_unicode,
            widths,
        }
    }

    /// Per-glyph widths for a shown string, used to track the pen position.
    pub fn glyphs(&self, bytes: &[u8]) -> Vec<Glyph> {
        match self.kind {
            FontKind::Simple => bytes
                .iter()
                .map(|&b| Glyph {
                    width: self.widths.get(u32::from(b)) / 1000.0,
                    is_space: b == b' ',
                })
                .collect(),
            FontKind::Composite => bytes
                .chunks(2)
                .map(|chunk| {
                    let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                    Glyph {
                        width: self.widths.get(code) / 1000.0,
                        is_space: false,
                    }
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let width = match self.kind {
            FontKind::Simple => 1,
            FontKind::Composite => 2,
        };
        let fallback = |code: u32| match self.kind {
            FontKind::Simple => u8::try_from(code).ok().and_then(win_ansi_decode),
            FontKind::Composite => char::from_u32(code).filter(|c| !c.is_control()),
        };

        match &self.to_unicode {
            Some(cmap) => cmap.decode(bytes, width, fallback),
            None => match self.kind {
                FontKind::Simple => bytes.iter().copied().filter_map(win_ansi_decode).collect(),
                FontKind::Composite => {
                    let units: Vec<u16> = bytes
                        .chunks(2)
                        .filter_map(|chunk| match chunk {
                            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
                            _ => None,
                        })
                        .collect();
                    String::from_utf16_lossy(&units)
                        .chars()
                        .filter(|c| !c.is_control() && *c != '\u{FFFD}')
                        .collect()
                }
            },
        }
    }
}
