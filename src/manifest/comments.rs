//! Token-based removal of `//` and `/* */` comments from manifest text.
//!
//! JSON shares its string literal syntax with Rust closely enough that the
//! Rust lexer tokenises a manifest correctly: string literals come back as a
//! single token, so comment markers inside them are never mistaken for
//! comments.

use rustc_lexer::{TokenKind, tokenize};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Remove comments from `source`, keeping every other token verbatim.
///
/// A leading byte order mark is dropped as well.
///
/// ```
/// use addon_ingest::manifest::strip_comments;
///
/// let source = "{\n  // note\n  \"url\": \"https://a/*b*/\" /* trailing */\n}";
/// assert_eq!(strip_comments(source), "{\n  \n  \"url\": \"https://a/*b*/\" \n}");
/// ```
#[must_use]
pub fn strip_comments(source: &str) -> String {
    let text = source.strip_prefix(BYTE_ORDER_MARK).unwrap_or(source);
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let consumed = strip_pass(rest, &mut output);
        if consumed == 0 {
            break;
        }
        rest = rest.get(consumed..).unwrap_or_default();
    }
    output
}

/// Copy non-comment tokens of `text` into `output`.
///
/// The Rust lexer nests block comments, JSON readers do not. When a block
/// comment closes earlier than the lexer thinks, the pass stops there and
/// returns how many bytes it consumed so the caller can re-tokenise.
fn strip_pass(text: &str, output: &mut String) -> usize {
    let mut offset = 0_usize;
    for token in tokenize(text) {
        let end = offset.saturating_add(token.len);
        let lexeme = text.get(offset..end).unwrap_or_default();
        match token.kind {
            TokenKind::LineComment { .. } => {}
            TokenKind::BlockComment { .. } => {
                let closed = offset.saturating_add(block_comment_len(lexeme));
                if closed < end {
                    return closed;
                }
            }
            _ => output.push_str(lexeme),
        }
        offset = end;
    }
    offset
}

/// Length of `comment` up to and including its first `*/`.
fn block_comment_len(comment: &str) -> usize {
    comment
        .get(2..)
        .and_then(|body| body.find("*/"))
        .map_or(comment.len(), |at| at.saturating_add(4))
}
