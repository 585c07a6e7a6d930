//! Contracts between the render engine and whatever compiles templates

use std::io::Write;
use std::sync::Arc;

use thiserror::Error;

use crate::parser::ParsedTemplate;

use super::context::RenderContext;

/// A runtime fault raised by the evaluator while rendering
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while locating templates or blocks
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// No template registered under this name
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// The block key is not defined by the owner nor by any other template
    #[error("block {key} not found (requested by {owner})")]
    BlockNotFound { owner: String, key: String },
}

/// A template ready to render, either a whole file or one of its blocks
pub trait CompiledTemplate: Send + Sync {
    /// Name the evaluator knows this template by
    fn name(&self) -> &str;

    /// The file this template was read from
    fn file(&self) -> &str;

    /// Source lines of the owning file
    fn content(&self) -> &[String];

    /// Yield keys referenced by this template's text
    fn slots(&self) -> &[String];

    /// Map a line reported by the evaluator to a line of the owning file
    fn source_line(&self, line: usize) -> usize {
        line
    }

    /// Render against `args`, writing output to `out`
    fn render(&self, out: &mut dyn Write, args: &RenderContext) -> Result<(), EvalError>;
}

/// Read access to a compiled template set.
///
/// Implementations are shared by every in-flight request and must be safe for
/// concurrent reads.
pub trait TemplateLookup: Send + Sync {
    /// Look up a whole template by name
    fn template(&self, name: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError>;

    /// Directive parse result for a template
    fn parsed(&self, name: &str) -> Result<Arc<ParsedTemplate>, LookupError>;

    /// Look up a block by key. The default slot key resolves against `owner`;
    /// any other key may be owned by a different template.
    fn block(&self, owner: &str, key: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError>;
}
