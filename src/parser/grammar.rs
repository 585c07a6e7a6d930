//! Directive reader
//!
//! A single forward pass over the source with one unconsumed line of
//! lookahead. Block regions are delimited by indentation: a header at column
//! zero, then every following indented or blank line, up to the first line that
//! starts at column zero again.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{ParseError, Span};
use crate::slot;

use super::ast::{Block, ParsedTemplate};
use super::lexer::{classify, is_blank, is_indented, rewrite_yields, split_terminator, LineKind};

/// Parse template source text. `file` is the identity block keys derive from.
pub fn parse(file: &str, source: &str) -> Result<ParsedTemplate, ParseError> {
    TemplateReader::new(file, source).parse()
}

/// Read and parse a template file, using its path as the file identity
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedTemplate, ParseError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&path.to_string_lossy(), &source)
}

/// A line taken off the input
struct Consumed<'a> {
    /// 1-based line number
    number: usize,
    /// Byte range of the line content, terminator excluded
    span: Span,
    content: &'a str,
    terminator: &'a str,
}

/// Accumulates rewritten lines for one block or the default body
#[derive(Default)]
struct BodyBuilder {
    text: String,
    yields: Vec<String>,
    line_map: Vec<usize>,
}

impl BodyBuilder {
    fn push(&mut self, line: &Consumed<'_>) {
        let (rewritten, keys) = rewrite_yields(line.content);
        self.text.push_str(&rewritten);
        self.text.push_str(line.terminator);
        self.line_map.push(line.number);
        for key in keys {
            if !self.yields.contains(&key) {
                self.yields.push(key);
            }
        }
    }

    fn finish(self, name: String) -> Block {
        Block {
            name,
            line: self.line_map.first().copied().unwrap_or(1),
            body: self.text,
            yields: self.yields,
            line_map: self.line_map,
        }
    }
}

struct TemplateReader<'a> {
    file: &'a str,
    lines: std::str::SplitInclusive<'a, char>,
    /// Un-consumed line
    pending: Option<&'a str>,
    /// Lines consumed so far
    number: usize,
    /// Byte offset of the next un-consumed line
    offset: usize,
}

impl<'a> TemplateReader<'a> {
    fn new(file: &'a str, source: &'a str) -> Self {
        Self {
            file,
            lines: source.split_inclusive('\n'),
            pending: None,
            number: 0,
            offset: 0,
        }
    }

    fn parse(mut self) -> Result<ParsedTemplate, ParseError> {
        let mut default = BodyBuilder::default();
        let mut blocks = BTreeMap::new();
        let mut yield_to_block = BTreeMap::new();
        let mut defined: HashMap<String, usize> = HashMap::new();

        while let Some(raw) = self.readline() {
            let (content, _) = split_terminator(raw);
            match classify(content) {
                LineKind::BlockHeader { name } => {
                    let header = self.consumeline(raw);
                    let name = name.to_lowercase();

                    if let Some(&first) = defined.get(&name) {
                        return Err(ParseError::DuplicateBlock {
                            file: self.file.to_string(),
                            line: header.number,
                            first,
                            name,
                            span: header.span,
                        });
                    }
                    defined.insert(name.clone(), header.number);

                    let block = self.read_block(name, &header)?;
                    let block_key = slot::block_key(self.file, &block.name);
                    yield_to_block.insert(slot::yield_key(&block.name), block_key.clone());
                    blocks.insert(block_key, block);
                }
                LineKind::MalformedBlock => {
                    let line = self.consumeline(raw);
                    return Err(ParseError::MalformedBlock {
                        file: self.file.to_string(),
                        line: line.number,
                        text: line.content.to_string(),
                        span: line.span,
                    });
                }
                LineKind::Text => {
                    let line = self.consumeline(raw);
                    default.push(&line);
                }
            }
        }

        // The default body is itself a block, so a layout can be filled too
        let default = default.finish(String::new());
        let body = default.body.clone();
        blocks.insert(slot::DEFAULT_SLOT.to_string(), default);
        yield_to_block.insert(slot::DEFAULT_SLOT.to_string(), slot::DEFAULT_SLOT.to_string());

        Ok(ParsedTemplate {
            file: self.file.to_string(),
            body,
            blocks,
            yield_to_block,
        })
    }

    fn read_block(&mut self, name: String, header: &Consumed<'_>) -> Result<Block, ParseError> {
        // the first body line must be indented by at least one space or tab
        let starts_indented = self
            .readline()
            .map(|raw| is_indented(split_terminator(raw).0))
            .unwrap_or(false);
        if !starts_indented {
            return Err(ParseError::UnterminatedBlock {
                file: self.file.to_string(),
                line: header.number,
                name,
                span: header.span.clone(),
            });
        }

        let mut body = BodyBuilder::default();
        while let Some(raw) = self.readline() {
            let (content, _) = split_terminator(raw);
            if !is_blank(content) && !is_indented(content) {
                break;
            }
            let line = self.consumeline(raw);
            body.push(&line);
        }

        Ok(body.finish(name))
    }

    fn readline(&mut self) -> Option<&'a str> {
        if self.pending.is_none() {
            self.pending = self.lines.next();
        }
        self.pending
    }

    fn consumeline(&mut self, raw: &'a str) -> Consumed<'a> {
        self.pending = None;
        self.number += 1;

        let (content, terminator) = split_terminator(raw);
        let start = self.offset;
        self.offset += raw.len();

        Consumed {
            number: self.number,
            span: start..start + content.len(),
            content,
            terminator,
        }
    }
}
