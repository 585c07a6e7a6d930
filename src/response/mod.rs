//! Turning render outcomes into responses
//!
//! A [`Responder`] writes exactly one header and at most one body to a
//! [`ResponseSink`]. Successful renders and error pages never share a sink.

mod pages;
mod result;

use std::io;

pub use pages::ErrorPages;
pub use result::{ErrorResult, PlaintextErrorResult, RenderTemplateResult};

/// Content type of rendered pages
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content type of plain-text fallbacks
pub const PLAINTEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// How the body length is announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ContentLength(usize),
    Chunked,
}

/// Where a response is written
pub trait ResponseSink {
    fn write_header(&mut self, status: u16, content_type: &str, framing: Framing);

    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;
}

/// The parts of a request that shape a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Response format, e.g. `html` or `json`
    pub format: String,
}

impl Default for Request {
    fn default() -> Self {
        Self::new("GET", "html")
    }
}

impl Request {
    pub fn new(method: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            format: format.into().to_lowercase(),
        }
    }

    /// HEAD responses carry headers only
    pub fn is_head(&self) -> bool {
        self.method == "HEAD"
    }
}

/// Something that can answer a request
pub trait Responder {
    fn apply(self, req: &Request, sink: &mut dyn ResponseSink);
}

/// Content type for a response format
pub fn content_type_for(format: &str) -> &'static str {
    match format {
        "html" => HTML_CONTENT_TYPE,
        "json" => "application/json; charset=utf-8",
        "xml" => "application/xml; charset=utf-8",
        "txt" => PLAINTEXT_CONTENT_TYPE,
        _ => "text/plain",
    }
}

/// A sink that keeps everything in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub framing: Option<Framing>,
    pub body: Vec<u8>,
    /// Number of `write_header` calls
    pub headers_written: usize,
    /// Number of `write_body` calls
    pub bodies_written: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ResponseSink for MemorySink {
    fn write_header(&mut self, status: u16, content_type: &str, framing: Framing) {
        self.status = Some(status);
        self.content_type = Some(content_type.to_string());
        self.framing = Some(framing);
        self.headers_written += 1;
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(body);
        self.bodies_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("json"), "application/json; charset=utf-8");
        assert_eq!(content_type_for("xml"), "application/xml; charset=utf-8");
        assert_eq!(content_type_for("txt"), "text/plain; charset=utf-8");
        assert_eq!(content_type_for("csv"), "text/plain");
    }

    #[test]
    fn test_request_normalizes() {
        let req = Request::new("head", "HTML");
        assert!(req.is_head());
        assert_eq!(req.format, "html");
        assert!(!Request::default().is_head());
    }
}
