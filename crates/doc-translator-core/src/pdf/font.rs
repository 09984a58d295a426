//! TrueType font embedding for synthesized PDFs.
//!
//! Text that Helvetica cannot encode is set in TrueType fonts embedded as
//! composite fonts:
//! - **Type0 font** with `Identity-H` encoding, so strings are 2-byte glyph ids
//!   - **CIDFontType2** carrying the widths of the glyphs actually used
//!     - **FontDescriptor** with the metrics and the **FontFile2** program
//!   - **ToUnicode CMap** mapping each used glyph back to its character
//!
//! Fonts come from `pdf.fonts` in the config, followed by whichever common
//! system fonts are installed. Complex-script shaping is not done: glyphs are
//! placed one per character in logical order.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, trace};
use ttf_parser::{Face, GlyphId, name_id};

use crate::error::{Error, Result};

/// Fonts probed when none are configured, in preference order
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansBengali-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansHebrew-Regular.ttf",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/google-droid-sans-fonts/DroidSansFallbackFull.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// `bfchar` entries per block; the CMap format allows at most 100
const BFCHAR_BLOCK: usize = 100;

const TO_UNICODE_HEADER: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
";

const TO_UNICODE_FOOTER: &str = "endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

static LOADED: LazyLock<Mutex<HashMap<PathBuf, Arc<EmbeddedFont>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static SYSTEM_FONTS: LazyLock<Vec<Arc<EmbeddedFont>>> = LazyLock::new(|| {
    let fonts: Vec<_> = SYSTEM_FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|path| path.is_file())
        .filter_map(|path| match cached(path) {
            Ok(font) => Some(font),
            Err(e) => {
                debug!("Skipping system font: {e}");
                None
            }
        })
        .collect();
    debug!("Found {} system fonts", fonts.len());
    fonts
});

fn unusable(path: &Path, reason: impl fmt::Display) -> Error {
    Error::Encode(format!("cannot use font {}: {reason}", path.display()))
}

/// Keep the characters a PDF name can carry without escaping.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
        .collect()
}

/// A TrueType font program read from disk.
pub struct EmbeddedFont {
    path: PathBuf,
    data: Vec<u8>,
    base_font: String,
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("path", &self.path)
            .field("base_font", &self.base_font)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl EmbeddedFont {
    /// Read and check a font file.
    ///
    /// Only single TrueType fonts (`glyf` outlines) can be embedded as
    /// `FontFile2`; collections and CFF-flavored OpenType are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| unusable(path, e))?;
        if ttf_parser::fonts_in_collection(&data).is_some() {
            return Err(unusable(path, "font collections are not supported"));
        }

        let base_font = {
            let face = Face::parse(&data, 0).map_err(|e| unusable(path, e))?;
            if face.tables().glyf.is_none() {
                return Err(unusable(path, "no TrueType outlines"));
            }
            face.names()
                .into_iter()
                .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
                .find_map(|name| name.to_string())
                .map(|name| sanitize_name(&name))
                .filter(|name| !name.is_empty())
                .or_else(|| {
                    path.file_stem()
                        .map(|stem| sanitize_name(&stem.to_string_lossy()))
                        .filter(|name| !name.is_empty())
                })
                .unwrap_or_else(|| "EmbeddedFont".to_string())
        };

        trace!("Loaded font {base_font} from {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            data,
            base_font,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PostScript name used as `BaseFont`
    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| unusable(&self.path, e))
    }
}

fn cached(path: &Path) -> Result<Arc<EmbeddedFont>> {
    let mut loaded = LOADED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(font) = loaded.get(path) {
        return Ok(Arc::clone(font));
    }
    let font = Arc::new(EmbeddedFont::load(path)?);
    loaded.insert(path.to_path_buf(), Arc::clone(&font));
    Ok(font)
}

/// Installed fonts from the well-known locations, probed once.
pub fn system_fonts() -> &'static [Arc<EmbeddedFont>] {
    &SYSTEM_FONTS
}

/// The font chain for a layout: configured fonts first, then system fonts.
///
/// A configured font that cannot be loaded is an error; missing system fonts
/// are simply skipped.
pub fn resolve_fonts(configured: &[PathBuf]) -> Result<Vec<Arc<EmbeddedFont>>> {
    let mut fonts = configured
        .iter()
        .map(|path| cached(path))
        .collect::<Result<Vec<_>>>()?;
    for font in system_fonts() {
        if !fonts.iter().any(|f| f.path() == font.path()) {
            fonts.push(Arc::clone(font));
        }
    }
    Ok(fonts)
}

/// A parsed font plus the glyphs one document has used from it.
pub struct Typeface<'a> {
    font: &'a EmbeddedFont,
    face: Face<'a>,
    units_per_em: f32,
    /// Glyph id to the character it was written for; `None` for `.notdef`
    used: BTreeMap<u16, Option<char>>,
}

impl<'a> Typeface<'a> {
    pub fn new(font: &'a EmbeddedFont) -> Result<Self> {
        let face = font.face()?;
        let units_per_em = f32::from(face.units_per_em().max(1));
        Ok(Self {
            font,
            face,
            units_per_em,
            used: BTreeMap::new(),
        })
    }

    /// Glyph for `c`, if the font has one.
    pub fn glyph(&self, c: char) -> Option<u16> {
        self.face.glyph_index(c).map(|g| g.0).filter(|&gid| gid != 0)
    }

    /// Advance width of a glyph in points.
    pub fn advance(&self, gid: u16, font_size: f32) -> f32 {
        let units = self.face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
        f32::from(units) / self.units_per_em * font_size
    }

    /// Remember that `gid` was written for `c`.
    pub fn record(&mut self, gid: u16, c: Option<char>) {
        self.used.entry(gid).or_insert(c);
    }

    pub fn is_used(&self) -> bool {
        !self.used.is_empty()
    }

    /// Width in PDF glyph space (thousandths of an em)
    fn scaled_width(&self, gid: u16) -> i64 {
        let units = self.face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
        i64::from(units) * 1000 / i64::from(self.face.units_per_em().max(1))
    }

    /// `W` array covering the used glyphs, grouping consecutive ids.
    fn widths_array(&self) -> Vec<Object> {
        let mut result = Vec::new();
        let mut iter = self.used.keys().copied().peekable();

        while let Some(first) = iter.next() {
            let mut widths = vec![Object::Integer(self.scaled_width(first))];
            let mut expected = first.checked_add(1);
            while let Some(next) = expected
                && iter.peek() == Some(&next)
            {
                widths.push(Object::Integer(self.scaled_width(next)));
                iter.next();
                expected = next.checked_add(1);
            }
            result.push(Object::Integer(i64::from(first)));
            result.push(Object::Array(widths));
        }

        result
    }

    fn to_unicode(&self) -> Vec<u8> {
        let entries: Vec<(u16, char)> = self
            .used
            .iter()
            .filter_map(|(&gid, &c)| c.map(|c| (gid, c)))
            .collect();

        let mut cmap = String::from(TO_UNICODE_HEADER);
        for block in entries.chunks(BFCHAR_BLOCK) {
            let _ = writeln!(cmap, "{} beginbfchar", block.len());
            for &(gid, c) in block {
                let mut units = [0u16; 2];
                let target: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|unit| format!("{unit:04X}"))
                    .collect();
                let _ = writeln!(cmap, "<{gid:04X}> <{target}>");
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str(TO_UNICODE_FOOTER);
        cmap.into_bytes()
    }

    /// Add the font objects to `doc` and return the Type0 font.
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        let font = self.font;
        let base_font = font.base_font().as_bytes().to_vec();

        let length = i64::try_from(font.data.len()).map_err(|_| unusable(&font.path, "file too large"))?;
        let font_file_id = doc.add_object(
            Stream::new(Dictionary::from_iter([("Length1", Object::Integer(length))]), font.data.clone())
                .with_compression(true),
        );

        let bbox = self.face.global_bounding_box();
        let ascent = self.face.ascender();
        let descriptor_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(base_font.clone())),
            ("Flags", Object::Integer(32)),
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(i64::from(bbox.x_min)),
                    Object::Integer(i64::from(bbox.y_min)),
                    Object::Integer(i64::from(bbox.x_max)),
                    Object::Integer(i64::from(bbox.y_max)),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(ascent))),
            ("Descent", Object::Integer(i64::from(self.face.descender()))),
            (
                "CapHeight",
                Object::Integer(i64::from(self.face.capital_height().unwrap_or(ascent))),
            ),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]));

        let default_width = self.glyph(' ').map_or(1000, |gid| self.scaled_width(gid));
        let cid_font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(base_font.clone())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                    ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(default_width)),
            ("W", Object::Array(self.widths_array())),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]));

        let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), self.to_unicode()));

        Ok(doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(base_font)),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ])))
    }
}
