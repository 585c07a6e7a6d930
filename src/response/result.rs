//! Render, error page and plain-text responses

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use crate::render::{Composer, Diagnostic, FaultKind, CONTEXT_RADIUS};
use crate::template::RenderContext;

use super::pages::{page_name, ErrorPages};
use super::{
    content_type_for, Framing, Request, Responder, ResponseSink, HTML_CONTENT_TYPE,
    PLAINTEXT_CONTENT_TYPE,
};

const INTERNAL_SERVER_ERROR: u16 = 500;

/// Render a content template through its layout
pub struct RenderTemplateResult<'a> {
    composer: &'a Composer,
    pages: &'a ErrorPages,
    name: String,
    args: RenderContext,
}

impl<'a> RenderTemplateResult<'a> {
    pub fn new(
        composer: &'a Composer,
        pages: &'a ErrorPages,
        name: impl Into<String>,
        args: RenderContext,
    ) -> Self {
        Self {
            composer,
            pages,
            name: name.into(),
            args,
        }
    }
}

impl Responder for RenderTemplateResult<'_> {
    fn apply(self, req: &Request, sink: &mut dyn ResponseSink) {
        let mut args = self.args;
        let buf = match self
            .composer
            .render_for_method(&self.name, &req.method, &mut args)
        {
            Ok(buf) => buf,
            Err(diagnostic) => {
                ErrorResult::new(self.pages, diagnostic)
                    .with_status(INTERNAL_SERVER_ERROR)
                    .with_args(args)
                    .apply(req, sink);
                return;
            }
        };

        let framing = if self.composer.config().render.chunked {
            Framing::Chunked
        } else {
            Framing::ContentLength(buf.len())
        };
        sink.write_header(200, HTML_CONTENT_TYPE, framing);

        if req.is_head() {
            return;
        }
        if let Err(e) = sink.write_body(&buf) {
            warn!(template = %self.name, "failed to write response body: {}", e);
        }
    }
}

/// Render the error page for a diagnostic
pub struct ErrorResult<'a> {
    pages: &'a ErrorPages,
    diagnostic: Diagnostic,
    status: u16,
    args: RenderContext,
}

impl<'a> ErrorResult<'a> {
    pub fn new(pages: &'a ErrorPages, diagnostic: Diagnostic) -> Self {
        Self {
            pages,
            diagnostic,
            status: 0,
            args: RenderContext::new(),
        }
    }

    /// Response status; 0 means 500
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Arguments of the failed render, passed on to the error page
    pub fn with_args(mut self, args: RenderContext) -> Self {
        self.args = args;
        self
    }

    fn render_page(&mut self, status: u16, format: &str) -> Result<Vec<u8>, Diagnostic> {
        let name = page_name(status, format);
        let page = self.pages.resolve(status, format).map_err(|e| {
            Diagnostic::new(FaultKind::DiagnosticRender, name.as_str(), e.to_string())
        })?;

        let mut shown = self.diagnostic.clone();
        let context = if self.pages.shows_source() {
            shown.context(CONTEXT_RADIUS)
        } else {
            shown.source_lines = None;
            Vec::new()
        };

        let arg_fault =
            |e: serde_json::Error| Diagnostic::new(FaultKind::DiagnosticRender, name.as_str(), e.to_string());
        self.args.insert_serialized("Error", &shown).map_err(arg_fault)?;
        self.args.insert_serialized("ErrorContext", &context).map_err(arg_fault)?;
        let json = serde_json::to_string(&shown).map_err(arg_fault)?;
        self.args.insert("ErrorJson", json);
        self.args.insert("RunMode", self.pages.run_mode());

        let mut buf = Vec::new();
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| page.render(&mut buf, &self.args)));
        match rendered {
            Ok(Ok(())) => Ok(buf),
            Ok(Err(e)) => Err(Diagnostic::new(FaultKind::DiagnosticRender, page.file(), e.message)),
            Err(_) => Err(Diagnostic::new(
                FaultKind::DiagnosticRender,
                page.file(),
                "panic while rendering the error page",
            )),
        }
    }
}

impl Responder for ErrorResult<'_> {
    fn apply(mut self, req: &Request, sink: &mut dyn ResponseSink) {
        let status = match self.status {
            0 => INTERNAL_SERVER_ERROR,
            status => status,
        };
        let format = if req.format.is_empty() {
            "html".to_string()
        } else {
            req.format.clone()
        };

        let buf = match self.render_page(status, &format) {
            Ok(buf) => buf,
            Err(secondary) => {
                error!(
                    status,
                    format = %format,
                    "error page unavailable: {}",
                    secondary.description
                );
                PlaintextErrorResult::with_secondary(&self.diagnostic, &secondary).apply(req, sink);
                return;
            }
        };

        sink.write_header(status, content_type_for(&format), Framing::ContentLength(buf.len()));
        if req.is_head() {
            return;
        }
        if let Err(e) = sink.write_body(&buf) {
            warn!(status, "failed to write error page: {}", e);
        }
    }
}

/// Minimal response used when no error page can be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextErrorResult {
    text: String,
}

impl PlaintextErrorResult {
    pub fn new(diagnostic: &Diagnostic) -> Self {
        Self {
            text: diagnostic.to_plain_text(),
        }
    }

    /// Embed both the original fault and the one raised by the error page
    pub fn with_secondary(original: &Diagnostic, secondary: &Diagnostic) -> Self {
        Self {
            text: format!(
                "Server Error:\n{}\n\nAdditionally, an error occurred when rendering the error page:\n{}",
                original.to_plain_text().trim_end(),
                secondary.to_plain_text().trim_end()
            ),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Responder for PlaintextErrorResult {
    fn apply(self, req: &Request, sink: &mut dyn ResponseSink) {
        sink.write_header(
            INTERNAL_SERVER_ERROR,
            PLAINTEXT_CONTENT_TYPE,
            Framing::ContentLength(self.text.len()),
        );
        if req.is_head() {
            return;
        }
        if let Err(e) = sink.write_body(self.text.as_bytes()) {
            warn!("failed to write plain-text error: {}", e);
        }
    }
}
