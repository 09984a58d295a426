//! WinAnsiEncoding, the single-byte encoding used for the standard fonts.
//!
//! Bytes 0x20–0x7E and 0xA0–0xFF coincide with Latin-1; 0x80–0x9F carry
//! typographic punctuation and a few extra Latin letters.

const HIGH_CONTROL_RANGE: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 euro
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None, // 0x90
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Decode one WinAnsi byte. Control bytes other than tab/newline map to `None`.
pub fn win_ansi_decode(byte: u8) -> Option<char> {
    match byte {
        b'\t' | b'\n' | b'\r' => Some(char::from(byte)),
        0x00..=0x1F | 0x7F => None,
        0x80..=0x9F => HIGH_CONTROL_RANGE[usize::from(byte - 0x80)],
        _ => Some(char::from(byte)),
    }
}

/// Encode one character, `None` when WinAnsi has no code for it.
pub fn win_ansi_encode(c: char) -> Option<u8> {
    match u32::from(c) {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(u32::from(c)).ok(),
        _ => HIGH_CONTROL_RANGE
            .iter()
            .position(|&entry| entry == Some(c))
            .and_then(|i| u8::try_from(i + 0x80).ok()),
    }
}
