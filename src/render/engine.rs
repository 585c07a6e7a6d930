//! Two-phase rendering: capture slots, then commit the enclosing template
//!
//! The capture phase renders every block referenced by a content template
//! into the [`RenderContext`]; the commit phase renders the layout (or the
//! content template itself) into a private buffer. Nothing reaches the caller
//! unless both phases succeed.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::ComposerConfig;
use crate::parser::{lexer, ParsedTemplate};
use crate::slot;
use crate::template::{CompiledTemplate, EvalError, LookupError, RenderContext, TemplateLookup};

use super::diagnostic::Diagnostic;
use super::extract::{extract, owning_file};

/// Argument set to `true` while blocks are being captured
pub const CAPTURE_MODE_ARG: &str = "ComposerCaptureMode";

/// Method used by [`Composer::render_named`] for layout selection
const DEFAULT_METHOD: &str = "GET";

/// Renders content templates through their layouts
#[derive(Clone)]
pub struct Composer {
    lookup: Arc<dyn TemplateLookup>,
    config: ComposerConfig,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Create a composer with default configuration
    pub fn new(lookup: Arc<dyn TemplateLookup>) -> Self {
        Self {
            lookup,
            config: ComposerConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn lookup(&self) -> &Arc<dyn TemplateLookup> {
        &self.lookup
    }

    /// Render `name` through the layout configured for it
    pub fn render_named(&self, name: &str, ctx: &mut RenderContext) -> Result<Vec<u8>, Diagnostic> {
        self.render_for_method(name, DEFAULT_METHOD, ctx)
    }

    /// Render `name` through the layout configured for it and `method`
    pub fn render_for_method(
        &self,
        name: &str,
        method: &str,
        ctx: &mut RenderContext,
    ) -> Result<Vec<u8>, Diagnostic> {
        let layout = self.config.layouts.resolve(name, method).map(str::to_owned);
        self.render_with_layout(name, layout.as_deref(), ctx)
    }

    /// Render `name`, committing `layout` when given and `name` itself otherwise
    pub fn render_with_layout(
        &self,
        name: &str,
        layout: Option<&str>,
        ctx: &mut RenderContext,
    ) -> Result<Vec<u8>, Diagnostic> {
        self.guarded(name, || {
            self.capture_slots(name, layout, ctx)?;
            let commit = layout.unwrap_or(name);
            debug!(template = %name, commit = %commit, "committing render");
            self.commit(commit, ctx)
        })
    }

    /// Capture `name`'s slots and render it to a string
    pub fn capture_named(&self, name: &str, ctx: &mut RenderContext) -> Result<String, Diagnostic> {
        self.guarded(name, || {
            self.capture_slots(name, None, ctx)?;
            let buf = self.commit(name, ctx)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        })
    }

    /// Catch-and-convert boundary around one top-level call
    fn guarded<T>(
        &self,
        name: &str,
        f: impl FnOnce() -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => Err(Diagnostic::execution(
                name,
                format!("panic while rendering: {}", panic_message(payload.as_ref())),
            )),
        };

        if let Err(diagnostic) = &result {
            error!(
                template = %name,
                kind = %diagnostic.kind,
                path = %diagnostic.path,
                line = diagnostic.line.unwrap_or(0),
                "render failed: {}",
                diagnostic.description
            );
        }
        result
    }

    /// Render every block `name` defines into `ctx` under its yield key.
    ///
    /// The default block is only captured when a layout will be committed;
    /// otherwise it is the commit body itself. The layout's own blocks then
    /// fill whatever slots the content template left open.
    fn capture_slots(
        &self,
        name: &str,
        layout: Option<&str>,
        ctx: &mut RenderContext,
    ) -> Result<(), Diagnostic> {
        let previous = ctx.insert(CAPTURE_MODE_ARG, true);
        let result = self
            .capture_owner(name, layout.is_some(), false, ctx)
            .and_then(|()| match layout {
                Some(layout) => self.capture_owner(layout, false, true, ctx),
                None => Ok(()),
            });
        match previous {
            Some(value) => ctx.insert(CAPTURE_MODE_ARG, value),
            None => ctx.remove(CAPTURE_MODE_ARG),
        };
        result
    }

    /// Capture the blocks `owner` defines.
    ///
    /// With `keep_filled`, slots already present in `ctx` are left alone so
    /// the content template's blocks win over the layout's.
    fn capture_owner(
        &self,
        owner: &str,
        include_default: bool,
        keep_filled: bool,
        ctx: &mut RenderContext,
    ) -> Result<(), Diagnostic> {
        let parsed = self
            .lookup
            .parsed(owner)
            .map_err(|e| self.lookup_diagnostic(owner, &e))?;

        let captured = if keep_filled {
            parsed
                .yield_to_block
                .keys()
                .filter(|key| ctx.contains_key(key.as_str()))
                .cloned()
                .collect()
        } else {
            HashSet::new()
        };

        let mut capture = Capture {
            composer: self,
            owner,
            parsed: &parsed,
            captured,
            resolving: Vec::new(),
        };

        parsed
            .yield_to_block
            .iter()
            .filter(|(yield_key, _)| include_default || yield_key.as_str() != slot::DEFAULT_SLOT)
            .try_for_each(|(yield_key, block_key)| capture.resolve(yield_key, block_key, ctx))
    }

    /// Render the commit template into a private buffer
    fn commit(&self, name: &str, ctx: &mut RenderContext) -> Result<Vec<u8>, Diagnostic> {
        let template = self
            .lookup
            .template(name)
            .map_err(|e| self.lookup_diagnostic(name, &e))?;

        for key in template.slots() {
            if !ctx.contains_key(key) {
                self.missing_slot(template.as_ref(), key, ctx)?;
            }
        }

        let mut buf = Vec::new();
        template
            .render(&mut buf, ctx)
            .map_err(|e| self.execution_diagnostic(template.as_ref(), &e))?;
        Ok(buf)
    }

    /// Handle a slot nobody filled: a fault when strict, empty otherwise
    fn missing_slot(
        &self,
        template: &dyn CompiledTemplate,
        key: &str,
        ctx: &mut RenderContext,
    ) -> Result<(), Diagnostic> {
        let name = slot::slot_name(key);
        let described = if name.is_empty() {
            "the default block".to_string()
        } else {
            format!("block \"{}\"", name)
        };

        if !self.config.render.strict_slots {
            warn!(template = %template.file(), slot = %name, "no content for slot, rendering it empty");
            ctx.insert(key, "");
            return Ok(());
        }

        let diagnostic = Diagnostic::capture(
            template.file(),
            format!("{} is not defined for {}", described, template.name()),
        )
        .with_line(yield_line(template.content(), key))
        .with_source(template.content().to_vec());
        Err(diagnostic)
    }

    fn lookup_diagnostic(&self, name: &str, err: &LookupError) -> Diagnostic {
        Diagnostic::capture(name, err.to_string())
    }

    /// Attribute an evaluator fault to a file and line
    fn execution_diagnostic(&self, template: &dyn CompiledTemplate, err: &EvalError) -> Diagnostic {
        let extracted = extract(&err.message);

        if !extracted.is_attributed() {
            return Diagnostic::execution(template.file(), extracted.description)
                .with_source(template.content().to_vec());
        }

        if extracted.template == template.name() {
            return Diagnostic::execution(template.file(), extracted.description)
                .with_line(template.source_line(extracted.line))
                .with_source(template.content().to_vec());
        }

        // raised inside another template, e.g. a partial
        let file = owning_file(&extracted.template);
        let line = self
            .lookup
            .parsed(file)
            .ok()
            .and_then(|parsed| block_line(&parsed, &extracted.template, extracted.line))
            .unwrap_or(extracted.line);
        let mut diagnostic = Diagnostic::execution(file, extracted.description).with_line(line);
        if let Ok(owner) = self.lookup.template(file) {
            diagnostic = diagnostic.with_source(owner.content().to_vec());
        }
        diagnostic
    }
}

/// State for one capture phase
struct Capture<'a> {
    composer: &'a Composer,
    owner: &'a str,
    parsed: &'a ParsedTemplate,
    captured: HashSet<String>,
    /// Yield keys currently being resolved, outermost first
    resolving: Vec<String>,
}

impl Capture<'_> {
    fn resolve(
        &mut self,
        yield_key: &str,
        block_key: &str,
        ctx: &mut RenderContext,
    ) -> Result<(), Diagnostic> {
        if self.captured.contains(yield_key) {
            return Ok(());
        }

        if self.resolving.iter().any(|k| k == yield_key) {
            let chain: Vec<&str> = self
                .resolving
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(yield_key))
                .map(display_slot)
                .collect();
            return Err(self.fault(format!("circular slot reference: {}", chain.join(" -> "))));
        }

        let max_depth = self.composer.config.render.max_capture_depth;
        if self.resolving.len() > max_depth {
            return Err(self.fault(format!(
                "slot \"{}\" is nested deeper than {} levels",
                display_slot(yield_key),
                max_depth
            )));
        }

        let block = self
            .composer
            .lookup
            .block(self.owner, block_key)
            .map_err(|e| self.fault(e.to_string()))?;

        let parsed = self.parsed;
        self.resolving.push(yield_key.to_string());
        for nested in block.slots() {
            if self.captured.contains(nested) {
                continue;
            }
            match parsed.yield_to_block.get(nested) {
                Some(nested_block) => self.resolve(nested, nested_block, ctx)?,
                None if ctx.contains_key(nested) => {}
                None => self.composer.missing_slot(block.as_ref(), nested, ctx)?,
            }
        }
        self.resolving.pop();

        debug!(template = %self.owner, block = %block.name(), "capturing block");
        let mut buf = Vec::new();
        block.render(&mut buf, ctx).map_err(|e| {
            self.composer
                .execution_diagnostic(block.as_ref(), &e)
                .with_title("Template Execution Error (Capture)")
        })?;

        ctx.insert(yield_key, String::from_utf8_lossy(&buf).into_owned());
        self.captured.insert(yield_key.to_string());
        Ok(())
    }

    fn fault(&self, description: String) -> Diagnostic {
        let mut diagnostic = Diagnostic::capture(self.owner, description);
        if let Ok(template) = self.composer.lookup.template(self.owner) {
            diagnostic = diagnostic.with_source(template.content().to_vec());
        }
        diagnostic
    }
}

/// Human readable slot name for messages
fn display_slot(key: &str) -> &str {
    match slot::slot_name(key) {
        "" => "(default)",
        name => name,
    }
}

/// Map a line reported against evaluator template `name` to its file line
fn block_line(parsed: &ParsedTemplate, name: &str, line: usize) -> Option<usize> {
    let block = match name.split_once('#') {
        Some((_, block)) => parsed.block_named(block)?,
        None => parsed.default_block()?,
    };
    Some(block.source_line(line))
}

/// First file line whose yield directive references `key`; 0 when none does
fn yield_line(content: &[String], key: &str) -> usize {
    content
        .iter()
        .position(|line| lexer::rewrite_yields(line).1.iter().any(|k| k == key))
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::parser;
    use crate::render::FaultKind;

    /// A lookup whose templates are scripted closures
    struct ScriptedLookup {
        parsed: HashMap<String, Arc<ParsedTemplate>>,
        templates: HashMap<String, Arc<dyn CompiledTemplate>>,
    }

    type Script = Box<dyn Fn(&mut dyn Write, &RenderContext) -> Result<(), EvalError> + Send + Sync>;

    fn script(
        f: impl Fn(&mut dyn Write, &RenderContext) -> Result<(), EvalError> + Send + Sync + 'static,
    ) -> Script {
        Box::new(f)
    }

    struct Scripted {
        name: String,
        content: Vec<String>,
        slots: Vec<String>,
        script: Script,
    }

    impl CompiledTemplate for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn file(&self) -> &str {
            &self.name
        }

        fn content(&self) -> &[String] {
            &self.content
        }

        fn slots(&self) -> &[String] {
            &self.slots
        }

        fn render(&self, out: &mut dyn Write, args: &RenderContext) -> Result<(), EvalError> {
            (self.script)(out, args)
        }
    }

    impl ScriptedLookup {
        fn new() -> Self {
            Self {
                parsed: HashMap::new(),
                templates: HashMap::new(),
            }
        }

        fn with(mut self, name: &str, source: &str, script: Script) -> Self {
            let parsed = parser::parse(name, source).unwrap();
            self.templates.insert(
                name.to_string(),
                Arc::new(Scripted {
                    name: name.to_string(),
                    content: source.lines().map(String::from).collect(),
                    slots: parsed.yields().to_vec(),
                    script,
                }),
            );
            self.parsed.insert(name.to_string(), Arc::new(parsed));
            self
        }
    }

    impl TemplateLookup for ScriptedLookup {
        fn template(&self, name: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError> {
            self.templates
                .get(name)
                .cloned()
                .ok_or_else(|| LookupError::NotFound {
                    name: name.to_string(),
                })
        }

        fn parsed(&self, name: &str) -> Result<Arc<ParsedTemplate>, LookupError> {
            self.parsed
                .get(name)
                .cloned()
                .ok_or_else(|| LookupError::NotFound {
                    name: name.to_string(),
                })
        }

        fn block(&self, owner: &str, key: &str) -> Result<Arc<dyn CompiledTemplate>, LookupError> {
            if key == slot::DEFAULT_SLOT {
                return self.template(owner);
            }
            Err(LookupError::BlockNotFound {
                owner: owner.to_string(),
                key: key.to_string(),
            })
        }
    }

    fn composer(lookup: ScriptedLookup) -> Composer {
        Composer::new(Arc::new(lookup))
    }

    #[test]
    fn test_panic_becomes_execution_fault() {
        let lookup = ScriptedLookup::new().with(
            "boom.html",
            "<p>boom</p>",
            script(|_, _| panic!("helper exploded")),
        );

        let err = composer(lookup)
            .render_named("boom.html", &mut RenderContext::new())
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Execution);
        assert_eq!(err.path, "boom.html");
        assert!(err.description.contains("helper exploded"));
    }

    #[test]
    fn test_partial_output_is_discarded() {
        let lookup = ScriptedLookup::new().with(
            "partial.html",
            "<p>one</p>\n<p>two</p>",
            script(|out, _| {
                out.write_all(b"<p>one</p>").unwrap();
                Err(EvalError::new(
                    "Error rendering \"partial.html\" line 2, col 1: Variable \"x\" not found",
                ))
            }),
        );

        let err = composer(lookup)
            .render_named("partial.html", &mut RenderContext::new())
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Execution);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.description, "Variable \"x\" not found");
        assert_eq!(err.source_lines.as_ref().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_unattributed_error_uses_top_level_template() {
        let lookup = ScriptedLookup::new().with(
            "page.html",
            "<p>x</p>",
            script(|_, _| Err(EvalError::new("io failure"))),
        );

        let err = composer(lookup)
            .capture_named("page.html", &mut RenderContext::new())
            .unwrap_err();
        assert_eq!(err.path, "page.html");
        assert_eq!(err.line, None);
        assert_eq!(err.description, "io failure");
        assert!(err.source_lines.is_some());
    }

    #[test]
    fn test_missing_block_lookup_is_capture_fault() {
        let lookup = ScriptedLookup::new().with(
            "content.html",
            "- block \"title\"\n  Acme\nWelcome\n",
            script(|out, _| out.write_all(b"Welcome").map_err(|e| EvalError::new(e.to_string()))),
        );

        let err = composer(lookup)
            .render_named("content.html", &mut RenderContext::new())
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Capture);
        assert_eq!(err.path, "content.html");
    }

    #[test]
    fn test_capture_mode_is_cleared_before_commit() {
        let lookup = ScriptedLookup::new().with(
            "page.html",
            "page",
            script(|out, args| {
                let flag = args.contains_key(CAPTURE_MODE_ARG);
                write!(out, "{}", flag).map_err(|e| EvalError::new(e.to_string()))
            }),
        );

        let mut ctx = RenderContext::new();
        let out = composer(lookup).render_named("page.html", &mut ctx).unwrap();
        assert_eq!(out, b"false");
        assert!(!ctx.contains_key(CAPTURE_MODE_ARG));
    }

    #[test]
    fn test_caller_capture_mode_value_is_restored() {
        let flag = |args: &RenderContext| {
            args.get(CAPTURE_MODE_ARG)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        let lookup = ScriptedLookup::new()
            .with(
                "page.html",
                "page",
                script(move |out, args| {
                    write!(out, "{}", flag(args)).map_err(|e| EvalError::new(e.to_string()))
                }),
            )
            .with(
                "layout.html",
                "= yield",
                script(move |out, args| {
                    let body = args
                        .get(slot::DEFAULT_SLOT)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    write!(out, "{}|{}", body, flag(args)).map_err(|e| EvalError::new(e.to_string()))
                }),
            );

        let mut ctx = RenderContext::new().with(CAPTURE_MODE_ARG, "keep");
        let out = composer(lookup)
            .render_with_layout("page.html", Some("layout.html"), &mut ctx)
            .unwrap();
        assert_eq!(out, b"true|\"keep\"");
        assert_eq!(ctx.get(CAPTURE_MODE_ARG), Some(&serde_json::json!("keep")));
    }

    #[test]
    fn test_unknown_template() {
        let err = composer(ScriptedLookup::new())
            .render_named("nope.html", &mut RenderContext::new())
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Capture);
        assert!(err.description.contains("nope.html"));
    }

    #[test]
    fn test_yield_line() {
        let content: Vec<String> = ["<h1>", "= yield \"title\"", "</h1>"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(yield_line(&content, &slot::yield_key("title")), 2);
        assert_eq!(yield_line(&content, &slot::yield_key("other")), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
