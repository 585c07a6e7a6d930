//! Slot capture, layout composition and fault diagnostics

pub mod diagnostic;
pub mod engine;
pub mod extract;
pub mod layout;

pub use diagnostic::{Diagnostic, FaultKind, SourceLine, CONTEXT_RADIUS};
pub use engine::{Composer, CAPTURE_MODE_ARG};
pub use extract::{extract, ExtractedError};
pub use layout::LayoutMap;
