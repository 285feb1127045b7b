//! HTTP front end on `may_minihttp`.

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle, READY_TIMEOUT};
pub use request::{decode_body, parse_request};
pub use response::{MinihttpSink, WIRE_HEADER_LIMIT};
pub use service::{health_endpoint, AppService, HEALTH_PATH};
