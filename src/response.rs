//! Response envelopes and the sink they materialize onto.
//!
//! A handler returns a [`Response`]: an empty, plain-text or JSON body plus a
//! status and optional headers. The envelope knows how to write itself onto
//! any [`ResponseSink`]; the server adapter provides one over the wire and
//! [`BufferedResponse`] keeps the result in memory.

use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

use crate::request::HeaderVec;

/// Body variants a handler can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No payload; the status reason phrase is sent as text.
    Empty,
    Text(String),
    Json(Value),
}

/// Polymorphic handler result.
///
/// Defaults per shape:
///
/// | shape | constructor | status | body |
/// |-------|-------------|--------|------|
/// | empty | [`Response::default`] | 200 | none |
/// | plain text | [`Response::blank_text`] | 200 | `""` |
/// | json | [`Response::empty_object`] | 200 | `{}` |
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(200)
    }
}

impl Response {
    /// Status only.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Body::Empty,
        }
    }

    /// Plain text, status 200.
    #[must_use]
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Body::Text(body.into()),
        }
    }

    /// JSON, status 200.
    #[must_use]
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Body::Json(body),
        }
    }

    /// Empty plain-text body, status 200.
    #[must_use]
    pub fn blank_text() -> Self {
        Self::plain(String::new())
    }

    /// `{}`, status 200.
    #[must_use]
    pub fn empty_object() -> Self {
        Self::json(Value::Object(serde_json::Map::new()))
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// JSON body, if this is a JSON envelope.
    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Write this envelope onto a sink. Headers go first, then the body.
    pub fn materialize(&self, sink: &mut dyn ResponseSink) {
        for (name, value) in &self.headers {
            sink.set_header(name, value);
        }
        match &self.body {
            Body::Empty => sink.send_status_only(self.status),
            Body::Text(text) => {
                sink.set_status(self.status);
                sink.send_body(text.as_bytes().to_vec());
            }
            Body::Json(value) => {
                sink.set_status(self.status);
                sink.send_json(value);
            }
        }
    }

    /// Materialize into memory.
    #[must_use]
    pub fn to_buffered(&self) -> BufferedResponse {
        let mut buffered = BufferedResponse::default();
        self.materialize(&mut buffered);
        buffered
    }
}

/// Reason phrase for a status code, falling back to `Unknown`.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Capability a response envelope writes itself onto.
pub trait ResponseSink {
    fn set_status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: &str);

    /// Send a text body. Sets `text/plain` unless a content type was set.
    fn send_body(&mut self, body: Vec<u8>);

    /// Send a JSON body with `application/json`.
    fn send_json(&mut self, body: &Value);

    /// Send the status with its reason phrase as the body.
    fn send_status_only(&mut self, status: u16) {
        self.set_status(status);
        self.send_body(status_reason(status).as_bytes().to_vec());
    }
}

/// In-memory sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl BufferedResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    fn send_body(&mut self, body: Vec<u8>) {
        if self.header("content-type").is_none() {
            self.set_header("content-type", "text/plain; charset=utf-8");
        }
        self.body = body;
    }

    fn send_json(&mut self, body: &Value) {
        self.set_header("content-type", "application/json");
        self.body = body.to_string().into_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_empty_ok() {
        let res = Response::default();
        assert_eq!(res.status, 200);
        assert_eq!(res.body, Body::Empty);
    }

    #[test]
    fn test_blank_shapes_default_to_ok() {
        let out = Response::blank_text().to_buffered();
        assert_eq!(out.status, 200);
        assert_eq!(out.text(), "");
        assert_eq!(out.header("content-type"), Some("text/plain; charset=utf-8"));

        let out = Response::empty_object().to_buffered();
        assert_eq!(out.status, 200);
        assert_eq!(out.json(), Some(json!({})));
    }

    #[test]
    fn test_empty_sends_reason_phrase() {
        let out = Response::empty(404).to_buffered();
        assert_eq!(out.status, 404);
        assert_eq!(out.text(), "Not Found");
    }

    #[test]
    fn test_plain_and_json_materialize() {
        let out = Response::plain("hello").with_status(201).to_buffered();
        assert_eq!(out.status, 201);
        assert_eq!(out.text(), "hello");
        assert_eq!(out.header("Content-Type"), Some("text/plain; charset=utf-8"));

        let out = Response::json(json!({"ok": true})).to_buffered();
        assert_eq!(out.status, 200);
        assert_eq!(out.json(), Some(json!({"ok": true})));
        assert_eq!(out.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_explicit_content_type_survives_text_body() {
        let out = Response::plain("<p>hi</p>")
            .with_header("Content-Type", "text/html")
            .to_buffered();
        assert_eq!(out.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_status_reason_unknown() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(422), "Unprocessable Entity");
        assert_eq!(status_reason(599), "Unknown");
    }
}
