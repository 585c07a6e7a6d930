//! Template lookup: compiled templates, their parse results, and render arguments
//!
//! The render engine only talks to templates through [`TemplateLookup`] and
//! [`CompiledTemplate`]. [`TemplateSet`] is the handlebars-backed
//! implementation used by the crate and the CLI.
//!
//! # Example
//!
//! ```rust
//! use template_composer::template::{RenderContext, TemplateLookup, TemplateSet};
//!
//! let set = TemplateSet::builder()
//!     .source("hello.html", "<p>Hello {{name}}</p>")
//!     .build()
//!     .unwrap();
//!
//! let mut out = Vec::new();
//! let ctx = RenderContext::new().with("name", "Acme");
//! set.template("hello.html").unwrap().render(&mut out, &ctx).unwrap();
//! assert_eq!(out, b"<p>Hello Acme</p>");
//! ```

mod context;
mod lookup;
mod registry;

pub use context::RenderContext;
pub use lookup::{CompiledTemplate, EvalError, LookupError, TemplateLookup};
pub use registry::{normalize_name, LoadError, TemplateSet, TemplateSetBuilder};
