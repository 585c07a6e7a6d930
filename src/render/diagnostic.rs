//! Structured fault descriptions handed to error pages

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::Serialize;
use thiserror::Error;

use crate::error::ParseError;
use crate::template::LoadError;

/// Lines shown on each side of the faulting line
pub const CONTEXT_RADIUS: usize = 5;

/// Which phase a fault was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Malformed directive or template syntax, raised at load time
    Parse,
    /// A slot could not be resolved before any output was committed
    Capture,
    /// The evaluator failed (or panicked) while rendering
    Execution,
    /// The error page itself could not be rendered
    DiagnosticRender,
}

impl FaultKind {
    /// Title used when none is given explicitly
    pub fn default_title(&self) -> &'static str {
        match self {
            FaultKind::Parse => "Template Parse Error",
            FaultKind::Capture => "Template Capture Error",
            FaultKind::Execution => "Template Execution Error",
            FaultKind::DiagnosticRender => "Error Page Render Error",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Parse => write!(f, "parse"),
            FaultKind::Capture => write!(f, "capture"),
            FaultKind::Execution => write!(f, "execution"),
            FaultKind::DiagnosticRender => write!(f, "diagnostic-render"),
        }
    }
}

/// One line of source shown around a fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
    pub is_error: bool,
}

/// A parse or render fault, ready to be shown to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{title} in {path}: {description}")]
pub struct Diagnostic {
    pub kind: FaultKind,
    pub title: String,
    /// Offending template file
    pub path: String,
    /// 1-based line within `path`
    pub line: Option<usize>,
    pub description: String,
    /// Full source of `path`, when available
    pub source_lines: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn new(kind: FaultKind, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: kind.default_title().to_string(),
            path: path.into(),
            line: None,
            description: description.into(),
            source_lines: None,
        }
    }

    /// A slot could not be resolved
    pub fn capture(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FaultKind::Capture, path, description)
    }

    /// The evaluator failed while rendering
    pub fn execution(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FaultKind::Execution, path, description)
    }

    /// Build a parse diagnostic for a directive fault in `content`
    pub fn from_parse_error(error: &ParseError, content: Vec<String>) -> Self {
        let path = match error {
            ParseError::MalformedBlock { file, .. }
            | ParseError::UnterminatedBlock { file, .. }
            | ParseError::DuplicateBlock { file, .. } => file.clone(),
            ParseError::Io { path, .. } => path.display().to_string(),
        };

        let mut diagnostic = Self::new(FaultKind::Parse, path, error.message());
        diagnostic.line = error.line();
        if !content.is_empty() {
            diagnostic.source_lines = Some(content);
        }
        diagnostic
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the line; 0 means unknown
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = (line > 0).then_some(line);
        self
    }

    pub fn with_source(mut self, lines: impl Into<Vec<String>>) -> Self {
        self.source_lines = Some(lines.into());
        self
    }

    /// Source lines within `radius` of the faulting line
    pub fn context(&self, radius: usize) -> Vec<SourceLine> {
        let (Some(line), Some(lines)) = (self.line, self.source_lines.as_ref()) else {
            return Vec::new();
        };
        if line == 0 || line > lines.len() {
            return Vec::new();
        }

        let first = line.saturating_sub(radius).max(1);
        let last = (line + radius).min(lines.len());
        (first..=last)
            .map(|number| SourceLine {
                number,
                text: lines[number - 1].clone(),
                is_error: number == line,
            })
            .collect()
    }

    /// Plain text rendering used when no error page is available
    pub fn to_plain_text(&self) -> String {
        let mut text = format!("{}\n\n", self.title);
        match self.line {
            Some(line) => text.push_str(&format!("{}:{}\n", self.path, line)),
            None => text.push_str(&format!("{}\n", self.path)),
        }
        text.push_str(&self.description);
        text.push('\n');

        let context = self.context(CONTEXT_RADIUS);
        if !context.is_empty() {
            text.push('\n');
            let width = context.last().map(|l| l.number.to_string().len()).unwrap_or(1);
            for line in context {
                let marker = if line.is_error { '>' } else { ' ' };
                text.push_str(&format!(
                    "{} {:>width$} | {}\n",
                    marker,
                    line.number,
                    line.text,
                    width = width
                ));
            }
        }
        text
    }

    /// Format with source context using ariadne, falling back to plain text
    pub fn report(&self) -> String {
        let (Some(line), Some(lines)) = (self.line, self.source_lines.as_ref()) else {
            return self.to_plain_text();
        };
        if line == 0 || line > lines.len() {
            return self.to_plain_text();
        }

        let source = lines.join("\n");
        // ariadne spans count characters, not bytes
        let start: usize = lines[..line - 1].iter().map(|l| l.chars().count() + 1).sum();
        let span = start..start + lines[line - 1].chars().count();
        let filename = self.path.as_str();

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&self.title)
            .with_label(
                Label::new((filename, span))
                    .with_message(&self.description)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source.as_str())), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_plain_text(),
        }
    }
}

impl From<&LoadError> for Diagnostic {
    fn from(err: &LoadError) -> Self {
        match err {
            LoadError::Parse { error, content } => {
                Diagnostic::from_parse_error(error, content.clone())
            }
            LoadError::Compile {
                file,
                line,
                message,
                content,
                ..
            } => {
                let mut diagnostic = Diagnostic::new(FaultKind::Parse, file.clone(), message.clone())
                    .with_title("Template Compilation Error")
                    .with_source(content.clone());
                diagnostic.line = *line;
                diagnostic
            }
            LoadError::Io { path, source } => {
                Diagnostic::new(FaultKind::Parse, path.display().to_string(), source.to_string())
                    .with_title("Template Load Error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_default_titles() {
        let diag = Diagnostic::execution("a.html", "boom");
        assert_eq!(diag.title, "Template Execution Error");
        assert_eq!(diag.kind, FaultKind::Execution);
        insta::assert_snapshot!(diag.to_string(), @"Template Execution Error in a.html: boom");
    }

    #[test]
    fn test_context_window() {
        let diag = Diagnostic::execution("a.html", "boom")
            .with_line(3)
            .with_source(lines(20));
        let context = diag.context(2);
        let numbers: Vec<usize> = context.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(context[2].is_error);
        assert_eq!(context[2].text, "line 3");
    }

    #[test]
    fn test_context_clamped_at_end() {
        let diag = Diagnostic::execution("a.html", "boom")
            .with_line(20)
            .with_source(lines(20));
        let numbers: Vec<usize> = diag.context(2).iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![18, 19, 20]);
    }

    #[test]
    fn test_context_requires_known_line() {
        let diag = Diagnostic::execution("a.html", "boom")
            .with_line(0)
            .with_source(lines(3));
        assert_eq!(diag.line, None);
        assert!(diag.context(5).is_empty());

        let out_of_range = Diagnostic::execution("a.html", "boom")
            .with_line(9)
            .with_source(lines(3));
        assert!(out_of_range.context(5).is_empty());
    }

    #[test]
    fn test_plain_text() {
        let diag = Diagnostic::capture("content.html", "block \"sidebar\" is not defined")
            .with_line(2)
            .with_source(vec!["<p>a</p>".to_string(), "= yield \"sidebar\"".to_string()]);
        assert_eq!(
            diag.to_plain_text(),
            "Template Capture Error\n\ncontent.html:2\nblock \"sidebar\" is not defined\n\n  1 | <p>a</p>\n> 2 | = yield \"sidebar\"\n"
        );
    }

    #[test]
    fn test_report_falls_back_without_source() {
        let diag = Diagnostic::execution("a.html", "boom");
        assert_eq!(diag.report(), diag.to_plain_text());
    }

    #[test]
    fn test_report_with_source() {
        let diag = Diagnostic::execution("a.html", "Variable \"x\" not found")
            .with_line(2)
            .with_source(lines(3));
        let report = diag.report();
        assert!(report.contains("Template Execution Error"));
        assert!(report.contains("a.html"));
    }

    #[test]
    fn test_report_keeps_label_after_multibyte_lines() {
        let source = vec![
            "<h1>Hôtel Éléphant</h1>".to_string(),
            "{{x}}".to_string(),
            "<p>ünïcödé</p>".to_string(),
        ];
        let diag = Diagnostic::execution("a.html", "boom")
            .with_line(2)
            .with_source(source);
        let report = diag.report();
        assert!(report.contains("boom"));
    }

    #[test]
    fn test_from_parse_load_error() {
        let err = LoadError::Parse {
            error: ParseError::UnterminatedBlock {
                file: "bad.html".to_string(),
                line: 1,
                name: "x".to_string(),
                span: 0..11,
            },
            content: vec!["- block \"x\"".to_string(), "oops".to_string()],
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.kind, FaultKind::Parse);
        assert_eq!(diag.path, "bad.html");
        assert_eq!(diag.line, Some(1));
        assert_eq!(diag.source_lines.as_ref().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_serializes_kind_in_snake_case() {
        let diag = Diagnostic::new(FaultKind::DiagnosticRender, "errors/500.html", "boom");
        let value = serde_json::to_value(&diag).unwrap();
        assert_eq!(value["kind"], "diagnostic_render");
        assert_eq!(value["line"], serde_json::Value::Null);
    }
}
