//! Compiled template set backed by handlebars
//!
//! A set is built once, from in-memory sources or a views directory, and is
//! read-only afterwards. Reloading means building a new set.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use handlebars::{Handlebars, HelperDef};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::parser::{self, Block, ParsedTemplate};
use crate::render::extract::extract;
use crate::slot;

use super::context::RenderContext;
use super::lookup::{CompiledTemplate, EvalError, LookupError, TemplateLookup};

/// Errors that can occur while building a template set
#[derive(Debug, Error)]
pub enum LoadError {
    /// A directive could not be parsed
    #[error("{error}")]
    Parse {
        #[source]
        error: ParseError,
        /// Source lines of the offending file
        content: Vec<String>,
    },

    /// The evaluator rejected a template or block body
    #[error("failed to compile template {name}: {message}")]
    Compile {
        /// Evaluator name (`file` or `file#block`)
        name: String,
        /// Owning file
        file: String,
        /// Line within the owning file, when the evaluator reported one
        line: Option<usize>,
        message: String,
        /// Source lines of the owning file
        content: Vec<String>,
    },

    /// The views directory could not be read
    #[error("failed to read views from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file body or block body compiled into the shared registry
struct HandlebarsTemplate {
    registry: Arc<Handlebars<'static>>,
    name: String,
    file: String,
    content: Arc<[String]>,
    slots: Vec<String>,
    line_map: Vec<usize>,
}

impl CompiledTemplate for HandlebarsTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn file(&self) -> &str {
        &self.file
    }

    fn content(&self) -> &[String] {
        &self.content
    }

    fn slots(&self) -> &[String] {
        &self.slots
    }

    fn source_line(&self, line: usize) -> usize {
        map_line(&self.line_map, line)
    }

    fn render(&self, out: &mut dyn Write, args: &RenderContext) -> Result<(), EvalError> {
        self.registry
            .render_to_write(&self.name, args, out)
            .map_err(|e| EvalError::new(e.to_string()))
    }
}

fn map_line(line_map: &[usize], line: usize) -> usize {
    line.checked_sub(1)
        .and_then(|idx| line_map.get(idx))
        .copied()
        .unwrap_or(line)
}

struct Entry {
    parsed: Arc<ParsedTemplate>,
    template: Arc<HandlebarsTemplate>,
    blocks: HashMap<String, Arc<HandlebarsTemplate>>,
}

/// Template lookup over a fixed set of parsed and compiled templates
pub struct TemplateSet {
    entries: HashMap<String, Entry>,
    /// Named block key -> owning template
    block_owners: HashMap<String, String>,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("TemplateSet")
            .field("templates", &names)
            .field("blocks", &self.block_owners.len())
            .finish()
    }
}

impl TemplateSet {
    /// Start building a new set
    pub fn builder() -> TemplateSetBuilder {
        TemplateSetBuilder::default()
    }

    /// Build a set from every file under `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::builder().dir(dir)?.build()
    }

    /// Check if a template exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Get all template names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&Entry, LookupError> {
        let name = normalize_name(name);
        self.entries
            .get(&name)
            .ok_or(LookupError::NotFound { name })
    }
}

impl TemplateLookup for TemplateSet {
    fn template(&self, name: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError> {
        let template: Arc<dyn CompiledTemplate> = self.entry(name)?.template.clone();
        Ok(template)
    }

    fn parsed(&self, name: &str) -> Result<Arc<ParsedTemplate>, LookupError> {
        Ok(self.entry(name)?.parsed.clone())
    }

    fn block(&self, owner: &str, key: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError> {
        if key == slot::DEFAULT_SLOT {
            return self.template(owner);
        }

        let not_found = || LookupError::BlockNotFound {
            owner: owner.to_string(),
            key: key.to_string(),
        };

        let owning = self.block_owners.get(key).ok_or_else(not_found)?;
        let block: Arc<dyn CompiledTemplate> = self
            .entry(owning)?
            .blocks
            .get(key)
            .ok_or_else(not_found)?
            .clone();
        Ok(block)
    }
}

/// Collects sources and evaluator settings for a [`TemplateSet`]
pub struct TemplateSetBuilder {
    sources: Vec<(String, String)>,
    strict: bool,
    helpers: Vec<(String, Box<dyn HelperDef + Send + Sync + 'static>)>,
}

impl Default for TemplateSetBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            strict: true,
            helpers: Vec::new(),
        }
    }
}

impl TemplateSetBuilder {
    /// Add a template from source text
    pub fn source(mut self, name: impl AsRef<str>, text: impl Into<String>) -> Self {
        self.sources.push((normalize_name(name.as_ref()), text.into()));
        self
    }

    /// Add every file under `dir`, named by its path relative to `dir`
    pub fn dir(mut self, dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        for path in files {
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            let name = normalize_name(&relative.to_string_lossy());
            let text = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            self.sources.push((name, text));
        }
        Ok(self)
    }

    /// Treat references to undefined arguments as render faults (default on)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register an evaluator helper available to every template
    pub fn helper(
        mut self,
        name: impl Into<String>,
        helper: Box<dyn HelperDef + Send + Sync + 'static>,
    ) -> Self {
        self.helpers.push((name.into(), helper));
        self
    }

    /// Parse and compile every source
    pub fn build(self) -> Result<TemplateSet, LoadError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.strict);
        for (name, helper) in self.helpers {
            registry.register_helper(&name, helper);
        }

        let mut staged = Vec::with_capacity(self.sources.len());
        for (name, text) in self.sources {
            let parsed = parser::parse(&name, &text).map_err(|error| LoadError::Parse {
                error,
                content: text.lines().map(String::from).collect(),
            })?;
            let content: Arc<[String]> = text.lines().map(String::from).collect();

            compile(&mut registry, &name, &name, &parsed.body, &content, default_map(&parsed))?;
            for block in parsed.blocks.values().filter(|b| !b.is_default()) {
                compile(
                    &mut registry,
                    &block_template_name(&name, block),
                    &name,
                    &block.body,
                    &content,
                    &block.line_map,
                )?;
            }

            debug!(template = %name, blocks = parsed.blocks.len() - 1, "compiled template");
            staged.push((name, parsed, content));
        }

        let registry = Arc::new(registry);
        let mut entries = HashMap::new();
        let mut block_owners = HashMap::new();

        for (name, parsed, content) in staged {
            let compiled = |evaluator_name: String, block: &Block| {
                Arc::new(HandlebarsTemplate {
                    registry: registry.clone(),
                    name: evaluator_name,
                    file: name.clone(),
                    content: content.clone(),
                    slots: block.yields.clone(),
                    line_map: block.line_map.clone(),
                })
            };

            let mut blocks = HashMap::new();
            let mut template = None;
            for (key, block) in &parsed.blocks {
                if block.is_default() {
                    template = Some(compiled(name.clone(), block));
                } else {
                    blocks.insert(key.clone(), compiled(block_template_name(&name, block), block));
                    block_owners.insert(key.clone(), name.clone());
                }
            }

            let Some(template) = template else {
                continue;
            };
            if entries
                .insert(
                    name.clone(),
                    Entry {
                        parsed: Arc::new(parsed),
                        template,
                        blocks,
                    },
                )
                .is_some()
            {
                warn!(template = %name, "template registered twice, keeping the last one");
            }
        }

        Ok(TemplateSet {
            entries,
            block_owners,
        })
    }
}

fn default_map(parsed: &ParsedTemplate) -> &[usize] {
    parsed
        .default_block()
        .map(|b| b.line_map.as_slice())
        .unwrap_or_default()
}

fn compile(
    registry: &mut Handlebars<'static>,
    name: &str,
    file: &str,
    body: &str,
    content: &[String],
    line_map: &[usize],
) -> Result<(), LoadError> {
    registry
        .register_template_string(name, body)
        .map_err(|e| {
            let message = e.to_string();
            let extracted = extract(&message);
            LoadError::Compile {
                name: name.to_string(),
                file: file.to_string(),
                line: (extracted.line > 0).then(|| map_line(line_map, extracted.line)),
                message,
                content: content.to_vec(),
            }
        })
}

/// Evaluator name of a block: `file#block`
fn block_template_name(file: &str, block: &Block) -> String {
    format!("{}#{}", file, block.name)
}

/// Template names are case-insensitive and always use `/`
pub fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").to_lowercase()
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
