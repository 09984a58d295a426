//! Minimal `ToUnicode` CMap reader.
//!
//! Only the parts needed to turn shown strings back into text are
//! understood: `codespacerange`, `bfchar` and `bfrange`. Everything else in
//! the CMap program is skipped.

use std::collections::HashMap;

/// Character code → Unicode mapping from a `ToUnicode` stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    /// (low, high, byte width) of every declared codespace range
    codespaces: Vec<(u32, u32, usize)>,
    chars: HashMap<(usize, u32), String>,
    ranges: Vec<BfRange>,
}

#[derive(Debug, Clone)]
struct BfRange {
    width: usize,
    low: u32,
    high: u32,
    target: RangeTarget,
}

#[derive(Debug, Clone)]
enum RangeTarget {
    /// UTF-16 units of the first code; later codes bump the last unit
    Incrementing(Vec<u16>),
    /// One explicit string per code
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl ToUnicodeCMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut iter = tokens.into_iter().peekable();

        while let Some(token) = iter.next() {
            let Token::Word(word) = token else { continue };
            match word.as_str() {
                "begincodespacerange" => {
                    while let Some(Token::Hex(low)) = iter.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(high)) = iter.next() else { break };
                        // A zero-width code would never consume input
                        if low.is_empty() || high.is_empty() {
                            continue;
                        }
                        cmap.codespaces.push((code_value(&low), code_value(&high), low.len()));
                    }
                }
                "beginbfchar" => {
                    while let Some(Token::Hex(src)) = iter.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(dst)) = iter.next() else { break };
                        cmap.chars.insert((src.len(), code_value(&src)), utf16_string(&dst));
                    }
                }
                "beginbfrange" => {
                    while let Some(Token::Hex(low)) = iter.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(high)) = iter.next() else { break };
                        let target = match iter.next() {
                            Some(Token::Hex(dst)) => RangeTarget::Incrementing(utf16_units(&dst)),
                            Some(Token::ArrayStart) => {
                                let mut strings = Vec::new();
                                while let Some(Token::Hex(dst)) = iter.next() {
                                    strings.push(utf16_string(&dst));
                                }
                                RangeTarget::Explicit(strings)
                            }
                            _ => break,
                        };
                        cmap.ranges.push(BfRange {
                            width: low.len(),
                            low: code_value(&low),
                            high: code_value(&high),
                            target,
                        });
                    }
                }
                _ => {}
            }
        }

        cmap
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty() && self.ranges.is_empty()
    }

    /// Byte widths declared by the codespace ranges, smallest first.
    pub fn code_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .codespaces
            .iter()
            .map(|&(_, _, w)| w)
            .filter(|&w| w > 0)
            .collect();
        widths.sort_unstable();
        widths.dedup();
        widths
    }

    /// Split `bytes` into codes and map each one.
    ///
    /// `default_width` applies when the CMap declares no codespace. Codes
    /// without a mapping are passed to `fallback`.
    pub fn decode(
        &self,
        bytes: &[u8],
        default_width: usize,
        fallback: impl Fn(u32) -> Option<char>,
    ) -> String {
        let widths = self.code_widths();
        let mut out = String::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let width = self.width_at(&bytes[pos..], &widths, default_width);
            let end = (pos + width).min(bytes.len());
            let code = code_value(&bytes[pos..end]);

            if let Some(text) = self.lookup(end - pos, code) {
                out.push_str(&text);
            } else if let Some(c) = fallback(code) {
                out.push(c);
            }
            pos = end;
        }

        out
    }

    fn width_at(&self, rest: &[u8], widths: &[usize], default_width: usize) -> usize {
        if widths.is_empty() {
            return default_width.max(1);
        }
        for &width in widths {
            if width > rest.len() {
                break;
            }
            let code = code_value(&rest[..width]);
            let in_space = self
                .codespaces
                .iter()
                .any(|&(low, high, w)| w == width && (low..=high).contains(&code));
            if in_space {
                return width;
            }
        }
        // No codespace matched: consume the smallest width to make progress
        widths[0].max(1)
    }

    fn lookup(&self, width: usize, code: u32) -> Option<String> {
        if let Some(text) = self.chars.get(&(width, code)) {
            return Some(text.clone());
        }

        let range = self
            .ranges
            .iter()
            .find(|r| r.width == width && (r.low..=r.high).contains(&code))?;
        let offset = code - range.low;

        match &range.target {
            RangeTarget::Incrementing(units) => {
                let mut units = units.clone();
                let last = units.last_mut()?;
                *last = last.wrapping_add(u16::try_from(offset).ok()?);
                Some(String::from_utf16_lossy(&units))
            }
            RangeTarget::Explicit(strings) => {
                strings.get(usize::try_from(offset).ok()?).cloned()
            }
        }
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|chunk| match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && data[end] != b'>' {
                    end += 1;
                }
                tokens.push(Token::Hex(parse_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in the CMap header; skip them
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }

    tokens
}

const fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%' | b'/' | b'{' | b'}')
}

fn parse_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&d| char::from(d).to_digit(16))
        .map(|d| u8::try_from(d).unwrap_or(0))
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            // Odd digit count: the missing digit is zero
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}
