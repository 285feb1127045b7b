use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

use may_minihttp::Response as WireResponse;
use serde_json::Value;
use tracing::warn;

use crate::response::{status_reason, ResponseSink};

/// Header slots in a `may_minihttp` response. Requests are decoded with the
/// same limit, so a request carrying more headers is rejected on the wire
/// before it reaches the router.
pub const WIRE_HEADER_LIMIT: usize = 16;

/// Distinct header lines kept for reuse across responses.
const INTERN_CAPACITY: usize = 4096;

const TEXT_CONTENT_TYPE: &str = "Content-Type: text/plain; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "Content-Type: application/json";

static INTERNED: OnceLock<RwLock<HashSet<&'static str>>> = OnceLock::new();
static INTERN_FULL_WARNED: AtomicBool = AtomicBool::new(false);

/// Turn a header line into the `'static` string `may_minihttp` requires.
///
/// Each distinct line is leaked once and reused afterwards. Past
/// [`INTERN_CAPACITY`] distinct lines new ones are leaked per response, so
/// headers with per-request values (ids, timestamps) grow memory with traffic.
pub(crate) fn intern_header_line(line: String) -> &'static str {
    let table = INTERNED.get_or_init(|| RwLock::new(HashSet::new()));
    if let Some(found) = table
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(line.as_str())
    {
        return *found;
    }
    let mut guard = table.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(found) = guard.get(line.as_str()) {
        return *found;
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    if guard.len() < INTERN_CAPACITY {
        guard.insert(leaked);
    } else if !INTERN_FULL_WARNED.swap(true, Ordering::Relaxed) {
        warn!(capacity = INTERN_CAPACITY, "Header intern table full, leaking new header lines");
    }
    leaked
}

/// [`ResponseSink`] over a `may_minihttp` response.
///
/// Header lines beyond [`WIRE_HEADER_LIMIT`] are dropped with a warning; one
/// slot stays free for the default `Content-Type`.
pub struct MinihttpSink<'a, 'b> {
    res: &'a mut WireResponse<'b>,
    has_content_type: bool,
    headers_written: usize,
}

impl<'a, 'b> MinihttpSink<'a, 'b> {
    pub fn new(res: &'a mut WireResponse<'b>) -> Self {
        Self {
            res,
            has_content_type: false,
            headers_written: 0,
        }
    }

    fn push_header_line(&mut self, line: &'static str) {
        self.res.header(line);
        self.headers_written += 1;
    }

    fn has_room(&self, is_content_type: bool) -> bool {
        let reserved = usize::from(!is_content_type && !self.has_content_type);
        self.headers_written + reserved < WIRE_HEADER_LIMIT
    }

    fn default_content_type(&mut self, line: &'static str) {
        if !self.has_content_type {
            self.push_header_line(line);
            self.has_content_type = true;
        }
    }
}

impl ResponseSink for MinihttpSink<'_, '_> {
    fn set_status(&mut self, status: u16) {
        self.res.status_code(usize::from(status), status_reason(status));
    }

    fn set_header(&mut self, name: &str, value: &str) {
        let is_content_type = name.eq_ignore_ascii_case("content-type");
        if !self.has_room(is_content_type) {
            warn!(header = %name, limit = WIRE_HEADER_LIMIT, "Response header dropped");
            return;
        }
        if is_content_type {
            self.has_content_type = true;
        }
        self.push_header_line(intern_header_line(format!("{name}: {value}")));
    }

    fn send_body(&mut self, body: Vec<u8>) {
        self.default_content_type(TEXT_CONTENT_TYPE);
        self.res.body_vec(body);
    }

    fn send_json(&mut self, body: &Value) {
        self.default_content_type(JSON_CONTENT_TYPE);
        self.res.body_vec(body.to_string().into_bytes());
    }
}
