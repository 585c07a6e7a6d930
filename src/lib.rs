//! Template Composer - layout/yield/block composition on top of handlebars
//!
//! Templates mark slots with yield directives and fill them with
//! indentation-delimited blocks:
//!
//! ```text
//! layout.html                      hotels/show.html
//! <title>                          - block "title"
//! = yield "title"                    Acme Inn
//! </title>                         <p>Welcome</p>
//! = yield
//! ```
//!
//! Rendering `hotels/show.html` through `layout.html` first captures each block
//! of the content file, then renders the layout with the captured fragments.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use template_composer::{Composer, RenderContext, TemplateSet};
//!
//! let views = TemplateSet::builder()
//!     .source("layout.html", "<title>\n= yield \"title\"\n</title>\n= yield\n")
//!     .source("show.html", "- block \"title\"\n  {{name}}\n<p>Welcome</p>\n")
//!     .build()
//!     .unwrap();
//!
//! let composer = Composer::new(Arc::new(views));
//! let mut ctx = RenderContext::new().with("name", "Acme Inn");
//! let html = composer
//!     .render_with_layout("show.html", Some("layout.html"), &mut ctx)
//!     .unwrap();
//!
//! let html = String::from_utf8(html).unwrap();
//! assert!(html.contains("Acme Inn"));
//! assert!(html.contains("<p>Welcome</p>"));
//! assert!(!html.contains("yield"));
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod render;
pub mod response;
pub mod slot;
pub mod template;

use std::path::Path;
use std::sync::Arc;

pub use config::{ComposerConfig, ConfigError, RenderOptions};
pub use error::ParseError;
pub use parser::{parse, parse_file, ParsedTemplate};
pub use render::{Composer, Diagnostic, FaultKind, LayoutMap};
pub use response::{ErrorPages, Framing, Request, Responder, ResponseSink};
pub use template::{LoadError, RenderContext, TemplateLookup, TemplateSet};

/// Load every template under `dir` and build a composer for it
///
/// # Example
///
/// ```rust
/// use template_composer::{load_views, ComposerConfig, RenderContext};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("hello.html"), "<p>{{greeting}}</p>").unwrap();
///
/// let composer = load_views(dir.path(), ComposerConfig::default()).unwrap();
/// let mut ctx = RenderContext::new().with("greeting", "hi");
/// assert_eq!(composer.render_named("hello.html", &mut ctx).unwrap(), b"<p>hi</p>");
/// ```
pub fn load_views(dir: impl AsRef<Path>, config: ComposerConfig) -> Result<Composer, LoadError> {
    let views = TemplateSet::from_dir(dir)?;
    Ok(Composer::new(Arc::new(views)).with_config(config))
}
