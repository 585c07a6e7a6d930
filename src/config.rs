//! Composer configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! [render]
//! chunked = false
//! strict_slots = true
//! max_capture_depth = 16
//! run_mode = "dev"
//!
//! [layouts]
//! "*" = "layout.html"
//! "GET:hotels/show.html" = "hotel.html"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::render::LayoutMap;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Options for the render pipeline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Use chunked transfer framing instead of a content length
    pub chunked: bool,
    /// Fail the capture phase when a referenced slot has no block
    pub strict_slots: bool,
    /// Maximum nesting of slots captured inside other slots
    pub max_capture_depth: usize,
    /// Exposed to error templates as `RunMode`
    pub run_mode: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            chunked: false,
            strict_slots: true,
            max_capture_depth: 16,
            run_mode: "dev".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub render: RenderOptions,
    pub layouts: LayoutMap,
}

impl ComposerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the layout map
    pub fn with_layouts(mut self, layouts: LayoutMap) -> Self {
        self.layouts = layouts;
        self
    }

    /// Enable or disable chunked framing
    pub fn with_chunked(mut self, chunked: bool) -> Self {
        self.render.chunked = chunked;
        self
    }

    /// Enable or disable strict slot checking
    pub fn with_strict_slots(mut self, strict: bool) -> Self {
        self.render.strict_slots = strict;
        self
    }

    /// Set the maximum slot nesting depth
    pub fn with_max_capture_depth(mut self, depth: usize) -> Self {
        self.render.max_capture_depth = depth;
        self
    }

    /// Set the run mode shown to error templates
    pub fn with_run_mode(mut self, run_mode: impl Into<String>) -> Self {
        self.render.run_mode = run_mode.into();
        self
    }
}
