//! Lexical extraction of function spans from Solidity source.
//!
//! This is a scanner, not a parser: it finds `function NAME(`, `constructor(`, `fallback(` and
//! `receive(` headers and follows brace nesting to the end of the body. Comments and string
//! literals are blanked out first so their braces and keywords are not counted. Anything the
//! scanner cannot make sense of is skipped.

use crate::lines::LineIndex;
use regex::bytes::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static FUNCTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:function\s+(?P<name>[A-Za-z_$][A-Za-z0-9_$]*)|(?P<special>constructor|fallback|receive))\s*\(",
    )
    .expect("invalid regex")
});

/// A body made of a single `return` statement on one line.
static RETURN_ONLY_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\{[ \t]*return\b[^;{}\n]*;[ \t]*\}").expect("invalid regex")
});

/// The textual span of one function.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRange {
    pub name: String,
    /// Byte offset of the leading keyword.
    pub start: usize,
    /// Byte offset of the closing brace of the body.
    pub end: usize,
    /// Zero-based line of `start`.
    pub line: usize,
    /// Zero-based line of `end`.
    pub end_line: usize,
}

impl FunctionRange {
    /// Returns true if `offset` lies within the span, both ends included.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Number of bytes spanned.
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }

    /// Returns the distance from `line` to the closer of the first and last line of this
    /// function, provided `line` lies within the span widened by `padding` lines on both sides.
    pub fn padded_line_distance(&self, line: usize, padding: usize) -> Option<usize> {
        if line + padding < self.line || line > self.end_line + padding {
            return None;
        }
        Some(line.abs_diff(self.line).min(line.abs_diff(self.end_line)))
    }
}

/// Extracts the spans of all functions with a body, in source order.
pub fn extract_ranges(source: &str) -> Vec<FunctionRange> {
    let masked = mask_comments_and_strings(source.as_bytes());
    let index = LineIndex::new(source);
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(caps) = FUNCTION_HEADER.captures_at(&masked, pos) {
        let Some(header) = caps.get(0) else { break };
        let Some(name) = caps.name("name").or_else(|| caps.name("special")) else { break };
        // `header.end()` is one past the opening parenthesis
        match body_end(&masked, header.end() - 1) {
            Some(end) => {
                let start = header.start();
                let name = String::from_utf8_lossy(name.as_bytes()).into_owned();
                trace!(%name, start, end, "found function");
                ranges.push(FunctionRange {
                    name,
                    start,
                    end,
                    line: index.line(start),
                    end_line: index.line(end),
                });
                pos = end + 1;
            }
            None => pos = header.end(),
        }
    }

    ranges
}

/// Returns the offset of the closing brace of the body that follows the parameter list opened
/// at `open_paren`, or `None` if the function has no body or the braces do not balance.
fn body_end(masked: &[u8], open_paren: usize) -> Option<usize> {
    let close_paren = matching(masked, open_paren, b'(', b')')?;
    let delim = masked[close_paren..].iter().position(|&b| b == b'{' || b == b';')?;
    let open_brace = close_paren + delim;
    if masked[open_brace] == b';' {
        return None;
    }
    if let Some(body) = RETURN_ONLY_BODY.find(&masked[open_brace..]) {
        return Some(open_brace + body.end() - 1);
    }
    matching(masked, open_brace, b'{', b'}')
}

/// Returns the offset of the delimiter closing the one at `open`.
fn matching(text: &[u8], open: usize, opening: u8, closing: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in text.iter().enumerate().skip(open) {
        if b == opening {
            depth += 1;
        } else if b == closing {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    LineComment,
    BlockComment,
    Str(u8),
}

/// Replaces every byte of comments and string literals, delimiters included, with a space.
///
/// Line breaks are kept and the length is unchanged, so offsets and lines carry over.
fn mask_comments_and_strings(src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    let mut state = Lexeme::Code;
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        let next = src.get(i + 1).copied();
        let mut width = 1;
        match state {
            Lexeme::Code => match (b, next) {
                (b'/', Some(b'/')) => (state, width) = (Lexeme::LineComment, 2),
                (b'/', Some(b'*')) => (state, width) = (Lexeme::BlockComment, 2),
                (b'"' | b'\'', _) => state = Lexeme::Str(b),
                _ => {
                    i += 1;
                    continue;
                }
            },
            Lexeme::LineComment if b == b'\n' => state = Lexeme::Code,
            Lexeme::BlockComment if (b, next) == (b'*', Some(b'/')) => {
                (state, width) = (Lexeme::Code, 2)
            }
            Lexeme::Str(_) if b == b'\\' => width = 2,
            Lexeme::Str(quote) if b == quote => state = Lexeme::Code,
            // unterminated literals end at the line break
            Lexeme::Str(_) if b == b'\n' => state = Lexeme::Code,
            _ => {}
        }
        let end = (i + width).min(src.len());
        for byte in &mut out[i..end] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
        i = end;
    }
    out
}
