//! Line classification for yield and block directives

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::slot;

/// A yield directive occupying a whole line: `= yield`, `= yield "name"`, `= yield("name")`
static LINE_YIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\A\s*=\s*yield(?:\s*|\s+"([a-zA-Z]+)"\s*|\s*\(\s*"([a-zA-Z]+)"\s*\)\s*)\z"#,
    )
    .expect("line yield pattern")
});

/// A yield interpolated into text: `#{ yield "name" }`, `#{ yield("name") }`
static INLINE_YIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"#\{\s*yield(?:\s+"([a-zA-Z]+)"|\s*\(\s*"([a-zA-Z]+)"\s*\))\s*\}"#)
        .expect("inline yield pattern")
});

/// A block header: `- block "name"`, `- block("name")`
static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\A-\s+block(?:\s+"([a-zA-Z]+)"|\s*\(\s*"([a-zA-Z]+)"\s*\))\s*\z"#)
        .expect("block header pattern")
});

/// Anything that starts out as a block header
static BLOCK_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A-\s*block\b").expect("block prefix pattern"));

/// Classification of one source line (terminator excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Opens a block region
    BlockHeader { name: &'a str },
    /// Looks like a block header but the argument is malformed
    MalformedBlock,
    /// Ordinary content, possibly containing yields
    Text,
}

/// Classify a line with its terminator already removed
pub fn classify(line: &str) -> LineKind<'_> {
    if !line.starts_with('-') {
        return LineKind::Text;
    }

    if let Some(caps) = BLOCK_HEADER.captures(line) {
        return LineKind::BlockHeader {
            name: captured_name(&caps),
        };
    }

    if BLOCK_LIKE.is_match(line) {
        LineKind::MalformedBlock
    } else {
        LineKind::Text
    }
}

/// Whether the line starts with at least one space or tab
pub fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

/// Whether the line holds nothing but whitespace
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Replace every yield directive in `line` with its slot placeholder.
///
/// Returns the rewritten line and the yield keys it referenced, in order.
pub fn rewrite_yields(line: &str) -> (Cow<'_, str>, Vec<String>) {
    if let Some(caps) = LINE_YIELD.captures(line) {
        let key = slot::yield_key(captured_name(&caps));
        return (Cow::Owned(slot::placeholder(&key)), vec![key]);
    }

    if !line.contains("#{") {
        return (Cow::Borrowed(line), Vec::new());
    }

    let mut keys = Vec::new();
    let rewritten = INLINE_YIELD.replace_all(line, |caps: &Captures<'_>| {
        let key = slot::yield_key(captured_name(caps));
        let placeholder = slot::placeholder(&key);
        keys.push(key);
        placeholder
    });
    (rewritten, keys)
}

/// Split a line into its content and its terminator (`\n`, `\r\n` or nothing)
pub fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn captured_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or("")
}
