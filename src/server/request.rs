use may_minihttp::Request;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

use crate::request::{parse_query, HeaderVec, IncomingRequest};

/// Decode a request body.
///
/// JSON is parsed when it parses; anything else is kept as a JSON string so
/// handlers still see what was sent. An empty body is no body.
#[must_use]
pub fn decode_body(raw: &str, content_type: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(json) => Some(json),
        Err(e) => {
            debug!(
                content_type = %content_type,
                error = %e,
                "Body is not JSON, keeping raw text"
            );
            Some(Value::String(raw.to_string()))
        }
    }
}

/// Turn a `may_minihttp` request into an [`IncomingRequest`].
///
/// Header names are lower-cased and the query string is form-decoded.
pub fn parse_request(req: Request) -> IncomingRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (raw_path.clone(), Vec::new()),
    };

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();
    debug!(
        header_count = headers.len(),
        query_count = query.len(),
        "Headers extracted"
    );

    let content_type = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "content-type")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();

    let mut raw_body = String::new();
    let body = match req.body().read_to_string(&mut raw_body) {
        Ok(size) => {
            if size > 0 {
                debug!(content_length = size, content_type = %content_type, "Request body read");
            }
            decode_body(&raw_body, &content_type)
        }
        Err(e) => {
            debug!(error = %e, "Request body unreadable, treating as empty");
            None
        }
    };

    info!(
        method = %method,
        path = %path,
        headers_count = headers.len(),
        has_body = body.is_some(),
        "HTTP request parsed"
    );

    IncomingRequest {
        method,
        path: if path.is_empty() { "/".to_string() } else { path },
        headers,
        query,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_body() {
        assert_eq!(
            decode_body(r#"{"id": 1}"#, "application/json"),
            Some(json!({"id": 1}))
        );
    }

    #[test]
    fn test_decode_text_body() {
        assert_eq!(
            decode_body("hello", "text/plain"),
            Some(Value::String("hello".to_string()))
        );
    }

    #[test]
    fn test_decode_empty_body() {
        assert_eq!(decode_body("", "application/json"), None);
    }
}
