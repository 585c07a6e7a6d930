//! Error types for directive parsing

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug)]
pub enum ParseError {
    /// A `- block` header whose argument is not `"name"` or `("name")`
    #[error("{file}:{line}: unexpected block syntax: {text}")]
    MalformedBlock {
        file: String,
        line: usize,
        text: String,
        span: Span,
    },

    /// A block header not followed by an indented line
    #[error("{file}:{line}: unexpected terminator of block \"{name}\"")]
    UnterminatedBlock {
        file: String,
        line: usize,
        name: String,
        span: Span,
    },

    /// The same block name defined twice in one file
    #[error("{file}:{line}: block \"{name}\" is already defined on line {first}")]
    DuplicateBlock {
        file: String,
        line: usize,
        first: usize,
        name: String,
        span: Span,
    },

    /// The template source could not be read
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// Line number (1-based) the fault was detected on
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedBlock { line, .. }
            | Self::UnterminatedBlock { line, .. }
            | Self::DuplicateBlock { line, .. } => Some(*line),
            Self::Io { .. } => None,
        }
    }

    /// Source span of the offending directive
    pub fn span(&self) -> Option<&Span> {
        match self {
            Self::MalformedBlock { span, .. }
            | Self::UnterminatedBlock { span, .. }
            | Self::DuplicateBlock { span, .. } => Some(span),
            Self::Io { .. } => None,
        }
    }

    /// Short message without the location prefix
    pub fn message(&self) -> String {
        match self {
            Self::MalformedBlock { text, .. } => format!("unexpected block syntax: {}", text),
            Self::UnterminatedBlock { name, .. } => {
                format!("unexpected terminator of block \"{}\"", name)
            }
            Self::DuplicateBlock { name, first, .. } => {
                format!("block \"{}\" is already defined on line {}", name, first)
            }
            Self::Io { source, .. } => source.to_string(),
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let Some(span) = self.span() else {
            return self.to_string();
        };

        let label = match self {
            Self::MalformedBlock { .. } => "expected `- block \"name\"` or `- block(\"name\")`",
            Self::UnterminatedBlock { .. } => "the next line must be indented",
            Self::DuplicateBlock { .. } => "block names must be unique within a file",
            Self::Io { .. } => "",
        };

        let span = char_span(source, span);
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.message())
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Convert a byte span into the character offsets ariadne labels use
fn char_span(source: &str, span: &Span) -> Span {
    let offset = |byte: usize| source.get(..byte).map_or(byte, |s| s.chars().count());
    offset(span.start)..offset(span.end)
}
