//! Colorized markup: one `<span style="color:#rrggbb;">` run per span and a
//! `<br>` after every line.

use super::structure::{Line, StructuredPage};

pub const LINE_BREAK: &str = "<br>";

const SPAN_OPEN_PREFIX: &str = "<span style=\"color:#";

/// Counters gathered while rendering, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub text_blocks: usize,
    pub lines: usize,
    pub runs: usize,
    /// Blocks without lines (images)
    pub skipped_blocks: usize,
}

/// Append one line: runs joined by a single space, then the line break.
///
/// Span text is trimmed and HTML-escaped; spans that are empty after
/// trimming produce no run.
pub fn render_line(line: &Line, out: &mut String) -> usize {
    let mut runs = 0;
    for span in &line.spans {
        let text = span.text.trim();
        if text.is_empty() {
            continue;
        }
        if runs > 0 {
            out.push(' ');
        }
        out.push_str("<span style=\"color:");
        out.push_str(&span.color.to_hex());
        out.push_str(";\">");
        out.push_str(&html_escape::encode_text(text));
        out.push_str("</span>");
        runs += 1;
    }
    out.push_str(LINE_BREAK);
    runs
}

/// Render pages in document order.
pub fn render_pages<'a>(pages: impl IntoIterator<Item = &'a StructuredPage>) -> (String, RenderStats) {
    let mut out = String::new();
    let mut stats = RenderStats::default();

    for page in pages {
        for block in &page.blocks {
            let Some(lines) = block.lines() else {
                stats.skipped_blocks += 1;
                continue;
            };
            stats.text_blocks += 1;
            for line in lines {
                stats.runs += render_line(line, &mut out);
                stats.lines += 1;
            }
        }
    }

    (out, stats)
}

/// Whether `text` looks like extracted PDF markup rather than plain prose.
pub fn is_markup(text: &str) -> bool {
    text.contains(SPAN_OPEN_PREFIX) || text.contains(LINE_BREAK)
}

/// Strip markup back to plain text: line breaks become newlines, tags are
/// dropped and entities decoded.
///
/// Tolerates the markup an LLM hands back, which may have lost closing tags,
/// changed tag case or used `<br/>`.
pub fn to_plain_text(markup: &str) -> String {
    let mut stripped = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(start) = rest.find('<') {
        stripped.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('>') else {
            // Not a tag; keep the remainder verbatim
            stripped.push_str(after);
            rest = "";
            break;
        };

        let tag = after[1..end].trim().to_ascii_lowercase();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        match name {
            "br" | "p" => stripped.push('\n'),
            "span" => {
                // Adjacent runs were separated by a space in the source
                if !tag.starts_with('/') && !stripped.ends_with(char::is_whitespace) && !stripped.is_empty() {
                    stripped.push(' ');
                }
            }
            _ => {}
        }
        rest = &after[end + 1..];
    }
    stripped.push_str(rest);

    let decoded = html_escape::decode_html_entities(&stripped);
    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
