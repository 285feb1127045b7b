//! Per-request state carried through a route chain.

use http::Method;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::ids::RequestId;

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because they repeat across requests and are
/// cheap to clone; values are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A request as it reaches a [`RouteTable`](crate::router::RouteTable), before routing.
///
/// The server adapter builds one from the wire; tests build them directly.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Raw method token as received, e.g. `GET`
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Headers with lower-cased names
    pub headers: HeaderVec,
    /// Decoded query pairs in arrival order
    pub query: Vec<(String, String)>,
    /// Parsed body, when one was sent
    pub body: Option<Value>,
}

impl IncomingRequest {
    /// Build a request from a method and a URI that may carry a query string.
    #[must_use]
    pub fn new(method: &str, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, Vec::new()),
        };
        Self {
            method: method.to_string(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            headers: HeaderVec::new(),
            query,
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decode a raw query string.
///
/// Pairs keep their arrival order; collapsing repeated keys is left to
/// [`RequestContext`], where the last occurrence wins.
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Mutable request state seen by middleware and handlers.
///
/// Query and path parameters start out as JSON strings; validation stages
/// replace them with their coerced values, so a handler behind an
/// `integer` schema sees a JSON number.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as received, without the query string
    pub path: String,
    /// Pattern of the route that matched, e.g. `/parameters-schema/:id`
    pub route: Arc<str>,
    /// Headers with lower-cased names; middleware may add or replace entries
    pub headers: HeaderVec,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub body: Option<Value>,
}

impl RequestContext {
    /// A bare context, mostly useful for driving middleware in isolation.
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            route: Arc::from(path),
            headers: HeaderVec::new(),
            query: Map::new(),
            params: Map::new(),
            body: None,
        }
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header. Names are stored lower-cased.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
    }

    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Headers as a JSON object, for handlers that echo them back.
    #[must_use]
    pub fn headers_json(&self) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}
