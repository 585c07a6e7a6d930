//! Error page lookup: application templates first, built-in pages second

use std::sync::Arc;

use crate::template::{CompiledTemplate, LoadError, LookupError, TemplateLookup, TemplateSet};

const BUILTIN_PAGES: &[(&str, &str)] = &[
    ("errors/500.html", include_str!("errors/500.html")),
    ("errors/500.txt", include_str!("errors/500.txt")),
    ("errors/500.json", include_str!("errors/500.json")),
    ("errors/404.html", include_str!("errors/404.html")),
];

/// Resolves `errors/{status}.{format}` templates
#[derive(Clone)]
pub struct ErrorPages {
    primary: Option<Arc<dyn TemplateLookup>>,
    secondary: Arc<dyn TemplateLookup>,
    run_mode: String,
}

impl std::fmt::Debug for ErrorPages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPages")
            .field("primary", &self.primary.is_some())
            .field("run_mode", &self.run_mode)
            .finish()
    }
}

impl ErrorPages {
    /// Pages backed only by the built-in error templates
    pub fn builtin() -> Result<Self, LoadError> {
        let secondary = BUILTIN_PAGES
            .iter()
            .fold(TemplateSet::builder(), |builder, (name, text)| {
                builder.source(name, *text)
            })
            .build()?;

        Ok(Self {
            primary: None,
            secondary: Arc::new(secondary),
            run_mode: "dev".to_string(),
        })
    }

    /// Pages backed by `secondary` only
    pub fn new(secondary: Arc<dyn TemplateLookup>) -> Self {
        Self {
            primary: None,
            secondary,
            run_mode: "dev".to_string(),
        }
    }

    /// Look in `primary` before the secondary set
    pub fn with_primary(mut self, primary: Arc<dyn TemplateLookup>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_run_mode(mut self, run_mode: impl Into<String>) -> Self {
        self.run_mode = run_mode.into();
        self
    }

    pub fn run_mode(&self) -> &str {
        &self.run_mode
    }

    /// Source context is only shown in dev mode
    pub fn shows_source(&self) -> bool {
        self.run_mode == "dev"
    }

    /// Find the page for `status` and `format`
    pub fn resolve(
        &self,
        status: u16,
        format: &str,
    ) -> Result<Arc<dyn CompiledTemplate>, LookupError> {
        let name = page_name(status, format);
        if let Some(page) = self.primary.as_ref().and_then(|p| p.template(&name).ok()) {
            return Ok(page);
        }
        self.secondary.template(&name)
    }
}

pub(crate) fn page_name(status: u16, format: &str) -> String {
    format!("errors/{}.{}", status, format)
}
