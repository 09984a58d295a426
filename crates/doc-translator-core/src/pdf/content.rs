//! Content stream interpreter.
//!
//! Walks a page's operators and rebuilds the block → line → span tree:
//!
//! - every `BT … ET` text object becomes a [`Block::Text`]
//! - a painted image XObject (or inline image) becomes a [`Block::Image`]
//! - form XObjects are interpreted in place with their own resources
//! - a baseline change starts a new [`Line`]
//! - consecutive text with the same font, size and fill color is one [`Span`]
//!
//! Positions are compared in device space (text matrix × CTM) so scaled or
//! translated forms behave like plain page content.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::fonts::{FontDecoder, name_of, number, resolve, resolve_dict, stream_bytes};
use super::structure::{Block, Color, Line, Span, StructuredPage};
use crate::error::{Error, Result};

/// Nested form XObjects deeper than this are ignored
const MAX_FORM_DEPTH: usize = 8;
/// Page tree levels searched for inherited resources
const MAX_INHERIT_DEPTH: usize = 32;
/// `TJ` adjustment (thousandths of an em) wide enough to be a word gap
const TJ_SPACE_THRESHOLD: f32 = 250.0;
/// Horizontal gap, as a fraction of the font size, read as a word break
const GAP_SPACE_FACTOR: f32 = 0.2;
/// Baseline shift, as a fraction of the font size, that starts a new line
const BASELINE_FACTOR: f32 = 0.5;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m × n` in PDF row-vector convention
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translate(tx: f32, ty: f32, m: &Matrix) -> Matrix {
    multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], m)
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    match numbers(operands).as_slice() {
        &[a, b, c, d, e, f] => Some([a, b, c, d, e, f]),
        _ => None,
    }
}

fn operand_name(operands: &[Object]) -> Option<String> {
    operands.iter().find_map(|o| match o {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    })
}

/// Graphics state entries that matter for text: saved by `q`, restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    font: Option<String>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz / 100`
    horizontal_scale: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            fill: Color::BLACK,
            font: None,
            font_size: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

/// A `BT … ET` object being filled.
#[derive(Debug)]
struct TextObject {
    tm: Matrix,
    tlm: Matrix,
    lines: Vec<Line>,
    /// Device-space baseline of the line being filled
    baseline: Option<f32>,
    /// Device-space x where the last glyph ended
    pen_x: Option<f32>,
    pending_space: bool,
}

impl TextObject {
    const fn new() -> Self {
        Self {
            tm: IDENTITY,
            tlm: IDENTITY,
            lines: Vec::new(),
            baseline: None,
            pen_x: None,
            pending_space: false,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = translate(tx, ty, &self.tlm);
        self.tm = self.tlm;
    }
}

/// Resources visible to one content stream.
struct Scope<'a> {
    fonts: HashMap<String, FontDecoder>,
    xobjects: Option<&'a Dictionary>,
}

impl<'a> Scope<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>) -> Self {
        let mut fonts = HashMap::new();
        let font_dict = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|obj| resolve_dict(doc, obj));
        if let Some(font_dict) = font_dict {
            for (name, obj) in font_dict.iter() {
                if let Some(font) = resolve_dict(doc, obj) {
                    fonts.insert(
                        String::from_utf8_lossy(name).into_owned(),
                        FontDecoder::from_dict(doc, font),
                    );
                }
            }
        }

        let xobjects = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|obj| resolve_dict(doc, obj));

        Self { fonts, xobjects }
    }
}

/// Find a page's `Resources`, walking up the page tree when inherited.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

struct Interpreter<'a> {
    doc: &'a Document,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text: Option<TextObject>,
    blocks: Vec<Block>,
    fallback_font: FontDecoder,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text: None,
            blocks: Vec::new(),
            fallback_font: FontDecoder::simple(),
        }
    }

    fn run(&mut self, operations: &[Operation], scope: &Scope<'a>, depth: usize) {
        for op in operations {
            self.apply(op, scope, depth);
        }
    }

    fn apply(&mut self, op: &Operation, scope: &Scope<'a>, depth: usize) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            // Graphics state
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(operands) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }

            // Fill color
            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(color) = fill_color(&numbers(operands)) {
                    self.state.fill = color;
                }
            }
            "cs" => self.state.fill = Color::BLACK,

            // Text objects
            "BT" => {
                self.finish_text();
                self.text = Some(TextObject::new());
            }
            "ET" => self.finish_text(),

            // Text state
            "Tf" => {
                self.state.font = operand_name(operands);
                if let Some(size) = operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.set_number(operands, |s, v| s.char_spacing = v),
            "Tw" => self.set_number(operands, |s, v| s.word_spacing = v),
            "Tz" => self.set_number(operands, |s, v| s.horizontal_scale = v / 100.0),
            "TL" => self.set_number(operands, |s, v| s.leading = v),

            // Positioning
            "Td" | "TD" => {
                if let &[tx, ty] = numbers(operands).as_slice() {
                    if op.operator == "TD" {
                        self.state.leading = -ty;
                    }
                    self.text_object().move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_from(operands) {
                    let text = self.text_object();
                    text.tlm = m;
                    text.tm = m;
                }
            }
            "T*" => self.next_line(),

            // Showing
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes, scope);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes, scope);
                }
            }
            "\"" => {
                if let [aw, ac, string] = operands {
                    self.state.word_spacing = number(aw).unwrap_or(self.state.word_spacing);
                    self.state.char_spacing = number(ac).unwrap_or(self.state.char_spacing);
                    self.next_line();
                    if let Some(bytes) = string_bytes(string) {
                        self.show(bytes, scope);
                    }
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = operands.first() else {
                    return;
                };
                for item in items {
                    if let Some(bytes) = string_bytes(item) {
                        self.show(bytes, scope);
                    } else if let Some(adjust) = number(item) {
                        self.adjust(adjust);
                    }
                }
            }

            // Images and forms
            "Do" => {
                if let Some(name) = operand_name(operands) {
                    self.paint_xobject(&name, scope, depth);
                }
            }
            "BI" => self.blocks.push(Block::Image {
                name: "inline".to_string(),
            }),

            _ => {}
        }
    }

    fn set_number(&mut self, operands: &[Object], set: impl FnOnce(&mut GraphicsState, f32)) {
        if let Some(value) = operands.first().and_then(number) {
            set(&mut self.state, value);
        }
    }

    /// Current text object; text operators outside `BT … ET` open one.
    fn text_object(&mut self) -> &mut TextObject {
        self.text.get_or_insert_with(TextObject::new)
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.text_object().move_line(0.0, -leading);
    }

    fn finish_text(&mut self) {
        if let Some(text) = self.text.take()
            && !text.lines.is_empty()
        {
            self.blocks.push(Block::Text { lines: text.lines });
        }
    }

    /// `TJ` number: move the pen back by `adjust / 1000` em.
    fn adjust(&mut self, adjust: f32) {
        let state = &self.state;
        let tx = -adjust / 1000.0 * state.font_size * state.horizontal_scale;
        let text = self.text.get_or_insert_with(TextObject::new);
        text.tm = translate(tx, 0.0, &text.tm);
        if -adjust > TJ_SPACE_THRESHOLD {
            text.pending_space = true;
        }
    }

    fn show(&mut self, bytes: &[u8], scope: &Scope<'a>) {
        let font_name = self.state.font.clone().unwrap_or_default();
        let decoder = match scope.fonts.get(&font_name) {
            Some(decoder) => decoder,
            None => {
                trace!("Font resource '{font_name}' not found, decoding as WinAnsi");
                &self.fallback_font
            }
        };
        let decoded = decoder.decode(bytes);
        let glyphs = decoder.glyphs(bytes);

        let state = &self.state;
        let ctm = state.ctm;
        let text = self.text.get_or_insert_with(TextObject::new);

        let trm = multiply(&text.tm, &ctm);
        let (x, y) = (trm[4], trm[5]);
        let scale = trm[2].hypot(trm[3]);
        let size = if scale > f32::EPSILON {
            state.font_size.abs() * scale
        } else {
            state.font_size.abs()
        };

        let same_line = text
            .baseline
            .is_some_and(|baseline| (y - baseline).abs() <= BASELINE_FACTOR * size.max(1.0));
        if same_line {
            if let Some(pen) = text.pen_x {
                let gap = x - pen;
                if gap > GAP_SPACE_FACTOR * size || -gap > size {
                    text.pending_space = true;
                }
            }
        } else {
            text.lines.push(Line::default());
            text.baseline = Some(y);
            text.pending_space = false;
        }

        if let Some(line) = text.lines.last_mut() {
            if text.pending_space
                && let Some(last) = line.spans.last_mut()
                && !last.text.ends_with(char::is_whitespace)
            {
                last.text.push(' ');
            }
            text.pending_space = false;

            let continues_span = line.spans.last().is_some_and(|last| {
                last.font == font_name
                    && last.color == state.fill
                    && (last.font_size - size).abs() < 0.01
            });
            match line.spans.last_mut() {
                Some(last) if continues_span => last.text.push_str(&decoded),
                _ => line.spans.push(Span {
                    text: decoded,
                    color: state.fill,
                    font: font_name,
                    font_size: size,
                }),
            }
        }

        let advance: f32 = glyphs
            .iter()
            .map(|g| {
                let spacing = if g.is_space {
                    state.char_spacing + state.word_spacing
                } else {
                    state.char_spacing
                };
                (g.width * state.font_size + spacing) * state.horizontal_scale
            })
            .sum();
        text.tm = translate(advance, 0.0, &text.tm);
        text.pen_x = Some(multiply(&text.tm, &ctm)[4]);
    }

    fn paint_xobject(&mut self, name: &str, scope: &Scope<'a>, depth: usize) {
        let doc = self.doc;
        let Some(obj) = scope.xobjects.and_then(|x| x.get(name.as_bytes()).ok()) else {
            debug!("XObject '{name}' not found in resources");
            return;
        };
        let Object::Stream(stream) = resolve(doc, obj) else {
            return;
        };

        match name_of(&stream.dict, b"Subtype").as_deref() {
            Some("Image") => self.blocks.push(Block::Image {
                name: name.to_string(),
            }),
            Some("Form") => {
                if depth >= MAX_FORM_DEPTH {
                    debug!("Form XObject '{name}' nested too deeply, skipping");
                    return;
                }
                let Some(data) = stream_bytes(stream) else {
                    debug!("Form XObject '{name}' could not be decompressed");
                    return;
                };
                let content = match Content::decode(&data) {
                    Ok(content) => content,
                    Err(e) => {
                        debug!("Form XObject '{name}' has an unreadable content stream: {e}");
                        return;
                    }
                };

                let own_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|obj| resolve_dict(doc, obj));
                let form_scope;
                let scope = match own_resources {
                    Some(resources) => {
                        form_scope = Scope::new(doc, Some(resources));
                        &form_scope
                    }
                    None => scope,
                };

                // A form paints inside its own q/Q pair and text object
                let saved_state = self.state.clone();
                let saved_text = self.text.take();
                if let Some(m) = stream.dict.get(b"Matrix").ok().and_then(|obj| match resolve(doc, obj) {
                    Object::Array(items) => matrix_from(items),
                    _ => None,
                }) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }

                let stack_depth = self.stack.len();
                self.run(&content.operations, scope, depth + 1);
                self.finish_text();
                self.stack.truncate(stack_depth);
                self.state = saved_state;
                self.text = saved_text;
            }
            other => trace!("Ignoring XObject '{name}' with subtype {other:?}"),
        }
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Fill color from `g`/`rg`/`k`/`sc`/`scn` operands; the component count
/// picks the color space. Pattern names leave the color unchanged.
fn fill_color(components: &[f32]) -> Option<Color> {
    match *components {
        [gray] => Some(Color::from_gray(gray)),
        [r, g, b] => Some(Color::from_rgb(r, g, b)),
        [c, m, y, k] => Some(Color::from_cmyk(c, m, y, k)),
        _ => None,
    }
}

/// Interpret one page's content stream.
///
/// Fails only when the content stream itself cannot be read; unknown
/// operators, missing fonts and missing XObjects are tolerated.
pub fn interpret_page(doc: &Document, page_id: ObjectId, page_num: usize) -> Result<StructuredPage> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| Error::DocumentParse(format!("page {}: {e}", page_num + 1)))?;
    let content = Content::decode(&data)
        .map_err(|e| Error::DocumentParse(format!("page {} content stream: {e}", page_num + 1)))?;

    let scope = Scope::new(doc, page_resources(doc, page_id));
    let mut interpreter = Interpreter::new(doc);
    interpreter.run(&content.operations, &scope, 0);
    interpreter.finish_text();

    Ok(StructuredPage {
        page_num,
        blocks: interpreter.blocks,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{PdfBuilder, op, text_at};

    fn single_page(operations: Vec<Operation>) -> StructuredPage {
        pages_of(&PdfBuilder::new().page(operations).build())
            .into_iter()
            .next()
            .unwrap()
    }

    fn pages_of(bytes: &[u8]) -> Vec<StructuredPage> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .enumerate()
            .map(|(i, &id)| interpret_page(&doc, id, i).unwrap())
            .collect()
    }

    fn span_texts(page: &StructuredPage) -> Vec<Vec<Vec<String>>> {
        page.text_blocks()
            .map(|lines| {
                lines
                    .iter()
                    .map(|l| l.spans.iter().map(|s| s.text.clone()).collect())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_single_black_span() {
        let page = single_page(text_at("F1", 12.0, (0.0, 0.0, 0.0), (72.0, 720.0), "Test"));

        assert_eq!(page.blocks.len(), 1);
        let lines = page.blocks[0].lines().unwrap();
        assert_eq!(lines.len(), 1);
        let span = &lines[0].spans[0];
        assert_eq!(span.text, "Test");
        assert_eq!(span.color, Color::BLACK);
        assert_eq!(span.font, "F1");
        assert!((span.font_size - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_default_color_is_black() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Tj", vec![Object::string_literal("plain")]),
            op("ET", vec![]),
        ]);
        let span = &page.blocks[0].lines().unwrap()[0].spans[0];
        assert_eq!(span.color, Color::BLACK);
    }

    #[test]
    fn test_color_change_splits_spans() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("rg", vec![Object::Real(1.0), 0.into(), 0.into()]),
            op("Tj", vec![Object::string_literal("Red")]),
            op("rg", vec![0.into(), 0.into(), Object::Real(1.0)]),
            op("Tj", vec![Object::string_literal("Blue")]),
            op("ET", vec![]),
        ]);

        let spans = &page.blocks[0].lines().unwrap()[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].color, Color(0xFF_0000));
        assert_eq!(spans[1].color, Color(0x00_00FF));
    }

    #[test]
    fn test_baseline_change_starts_new_line() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("TL", vec![14.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("First")]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("Second")]),
            op("'", vec![Object::string_literal("Third")]),
            op("ET", vec![]),
        ]);

        assert_eq!(
            span_texts(&page),
            vec![vec![
                vec!["First".to_string()],
                vec!["Second".to_string()],
                vec!["Third".to_string()],
            ]]
        );
    }

    #[test]
    fn test_gap_on_same_baseline_inserts_space() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("Hello")]),
            op("Td", vec![100.into(), 0.into()]),
            op("Tj", vec![Object::string_literal("World")]),
            op("ET", vec![]),
        ]);

        assert_eq!(span_texts(&page), vec![vec![vec!["Hello World".to_string()]]]);
    }

    #[test]
    fn test_tj_kerning() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Ke"),
                    Object::Integer(-30),
                    Object::string_literal("rned"),
                    Object::Integer(-400),
                    Object::string_literal("words"),
                ])],
            ),
            op("ET", vec![]),
        ]);

        assert_eq!(span_texts(&page), vec![vec![vec!["Kerned words".to_string()]]]);
    }

    #[test]
    fn test_each_text_object_is_a_block() {
        let mut ops = text_at("F1", 12.0, (0.0, 0.0, 0.0), (72.0, 720.0), "One");
        ops.extend(text_at("F2", 12.0, (0.0, 0.0, 0.0), (72.0, 600.0), "Two"));
        let page = single_page(ops);

        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.blocks[1].lines().unwrap()[0].spans[0].font, "F2");
    }

    #[test]
    fn test_image_xobject_becomes_image_block() {
        let mut ops = text_at("F1", 12.0, (0.0, 0.0, 0.0), (72.0, 720.0), "Caption");
        ops.extend([
            op("q", vec![]),
            op("cm", vec![100.into(), 0.into(), 0.into(), 100.into(), 72.into(), 500.into()]),
            op("Do", vec![Object::Name(b"Im0".to_vec())]),
            op("Q", vec![]),
        ]);
        let bytes = PdfBuilder::new().image("Im0").page(ops).build();
        let page = &pages_of(&bytes)[0];

        assert_eq!(page.blocks.len(), 2);
        assert!(matches!(&page.blocks[1], Block::Image { name } if name == "Im0"));
        assert_eq!(page.text_blocks().count(), 1);
    }

    #[test]
    fn test_form_xobject_text_is_extracted() {
        let form = text_at("F1", 12.0, (0.0, 0.5, 0.0), (0.0, 0.0), "In form");
        let ops = vec![op("Do", vec![Object::Name(b"Fm0".to_vec())])];
        let bytes = PdfBuilder::new().form("Fm0", form).page(ops).build();
        let page = &pages_of(&bytes)[0];

        let span = &page.blocks[0].lines().unwrap()[0].spans[0];
        assert_eq!(span.text, "In form");
        assert_eq!(span.color, Color(0x00_8000));
    }

    #[test]
    fn test_q_restores_fill_color() {
        let page = single_page(vec![
            op("q", vec![]),
            op("rg", vec![Object::Real(1.0), 0.into(), 0.into()]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Tj", vec![Object::string_literal("after")]),
            op("ET", vec![]),
        ]);
        assert_eq!(page.blocks[0].lines().unwrap()[0].spans[0].color, Color::BLACK);
    }

    #[test]
    fn test_empty_page() {
        let page = single_page(Vec::new());
        assert!(page.blocks.is_empty());
    }

    #[test]
    fn test_scaled_font_size() {
        let page = single_page(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 1.into()]),
            op("Tm", vec![18.into(), 0.into(), 0.into(), 18.into(), 72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("Title")]),
            op("ET", vec![]),
        ]);
        let span = &page.blocks[0].lines().unwrap()[0].spans[0];
        assert!((span.font_size - 18.0).abs() < 0.01);
    }

    #[test]
    fn test_fill_color_operand_counts() {
        assert_eq!(fill_color(&[0.0]), Some(Color::BLACK));
        assert_eq!(fill_color(&[0.0, 1.0, 0.0]), Some(Color(0x00_FF00)));
        assert_eq!(fill_color(&[0.0, 0.0, 0.0, 0.0]), Some(Color(0xFF_FFFF)));
        assert_eq!(fill_color(&[]), None);
    }
}
