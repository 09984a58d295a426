//! Page → block → line → span tree recovered from a page's content stream.

/// Fill color as a 24-bit sRGB integer (`0xRRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Self = Self(0);

    pub fn from_gray(gray: f32) -> Self {
        let v = channel(gray);
        Self::from_rgb_bytes(v, v, v)
    }

    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::from_rgb_bytes(channel(r), channel(g), channel(b))
    }

    /// Naive CMYK conversion, good enough for display colors.
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        let k = k.clamp(0.0, 1.0);
        Self::from_rgb(
            (1.0 - c.clamp(0.0, 1.0)) * (1.0 - k),
            (1.0 - m.clamp(0.0, 1.0)) * (1.0 - k),
            (1.0 - y.clamp(0.0, 1.0)) * (1.0 - k),
        )
    }

    pub const fn from_rgb_bytes(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// `#rrggbb`, zero-padded
    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0 & 0x00FF_FFFF)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f32) -> u8 {
    // Clamped to 0.0-1.0 first, so the product fits in a u8
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A run of text sharing one font, size and fill color.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub color: Color,
    /// Font resource name as used in the content stream (e.g. `F1`)
    pub font: String,
    pub font_size: f32,
}

/// Text shown on one baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    /// Concatenated span text
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Top-level content grouping on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A text object (`BT … ET`)
    Text { lines: Vec<Line> },
    /// An image painted on the page; carries no text
    Image { name: String },
}

impl Block {
    /// Lines of a text block; `None` for non-text blocks.
    pub fn lines(&self) -> Option<&[Line]> {
        match self {
            Self::Text { lines } => Some(lines),
            Self::Image { .. } => None,
        }
    }
}

/// One page's blocks in content-stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredPage {
    /// 0-based page number
    pub page_num: usize,
    pub blocks: Vec<Block>,
}

impl StructuredPage {
    pub fn text_blocks(&self) -> impl Iterator<Item = &[Line]> {
        self.blocks.iter().filter_map(Block::lines)
    }
}
