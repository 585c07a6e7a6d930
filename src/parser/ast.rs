//! Parse results for a single template source

use std::collections::BTreeMap;

use crate::slot;

/// A named, indentation-delimited region of template source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block name as written (lower-cased); empty for the default block
    pub name: String,
    /// Block body with yields rewritten to placeholders
    pub body: String,
    /// Line (1-based) of the first body line within the owning file
    pub line: usize,
    /// Yield keys referenced by the body, in order of first appearance
    pub yields: Vec<String>,
    /// Source line of each body line; the default body is not contiguous
    pub line_map: Vec<usize>,
}

impl Block {
    /// Whether this is the implicit whole-file block
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Map a 1-based line within the body back to its line in the file
    pub fn source_line(&self, body_line: usize) -> usize {
        body_line
            .checked_sub(1)
            .and_then(|idx| self.line_map.get(idx))
            .copied()
            .unwrap_or(self.line + body_line.saturating_sub(1))
    }
}

/// The result of parsing one template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    /// File identity the keys were derived from
    pub file: String,
    /// Default content with yields rewritten to placeholders
    pub body: String,
    /// Block key -> block
    pub blocks: BTreeMap<String, Block>,
    /// Yield key -> block key, for blocks defined in this file
    pub yield_to_block: BTreeMap<String, String>,
}

impl ParsedTemplate {
    /// The implicit block holding the whole default body
    pub fn default_block(&self) -> Option<&Block> {
        self.blocks.get(slot::DEFAULT_SLOT)
    }

    /// Look up a block by its (case-insensitive) name
    pub fn block_named(&self, name: &str) -> Option<&Block> {
        self.blocks.get(&slot::block_key(&self.file, name))
    }

    /// Yield keys referenced by the default body
    pub fn yields(&self) -> &[String] {
        self.default_block()
            .map(|b| b.yields.as_slice())
            .unwrap_or_default()
    }

    /// Names of every explicitly defined block
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .values()
            .filter(|b| !b.is_default())
            .map(|b| b.name.as_str())
    }
}
