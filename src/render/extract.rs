//! Recover template name, line and message from evaluator error text

use once_cell::sync::Lazy;
use regex::Regex;

/// `Error rendering "name" line 3, col 7: reason`
static RENDER_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\AError rendering "([^"]*)" line (\d+), col \d+: (.*)\z"#)
        .expect("render error pattern")
});

/// `--> Template error in "name":3:7` followed by an optional `= reason: ...` line
static COMPILE_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Template error in "([^"]*)":(\d+):\d+"#).expect("compile error pattern")
});

static COMPILE_REASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*= reason: (.*)$").expect("compile reason pattern"));

/// `template: name:3: reason` and `template: name:3:7: reason`
static GENERIC_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\Atemplate: ([^:\s]+):(\d+):(?:\d+:)?\s*(.*)\z").expect("generic error pattern")
});

/// Best-effort attribution of an evaluator error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedError {
    /// Evaluator template name; empty when the error could not be attributed
    pub template: String,
    /// 1-based line, 0 when unknown
    pub line: usize,
    pub description: String,
}

impl ExtractedError {
    /// Whether a template name was recovered
    pub fn is_attributed(&self) -> bool {
        !self.template.is_empty()
    }
}

/// Parse evaluator error text. Unrecognized text degrades to `("", 0, text)`.
pub fn extract(raw: &str) -> ExtractedError {
    let raw = raw.trim_end();

    if let Some(caps) = RENDER_ERROR.captures(raw) {
        return ExtractedError {
            template: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            description: caps[3].trim().to_string(),
        };
    }

    if let Some(caps) = COMPILE_ERROR.captures(raw) {
        let description = COMPILE_REASON
            .captures(raw)
            .map(|reason| reason[1].trim().to_string())
            .or_else(|| raw.lines().next().map(|l| l.trim().to_string()))
            .unwrap_or_default();
        return ExtractedError {
            template: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            description,
        };
    }

    if let Some(caps) = GENERIC_ERROR.captures(raw) {
        return ExtractedError {
            template: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            description: caps[3].trim().to_string(),
        };
    }

    ExtractedError {
        template: String::new(),
        line: 0,
        description: raw.to_string(),
    }
}

/// Split an evaluator name of the form `file#block` into its owning file
pub fn owning_file(template: &str) -> &str {
    template.split_once('#').map(|(file, _)| file).unwrap_or(template)
}
