mod common;

use common::fixtures::fixture_table;
use common::test_server::{get, post_json, start};
use kudy::server::WIRE_HEADER_LIMIT;
use kudy::{Response, RouteTable, RouterNode};

#[test]
fn test_fixture_routes_over_http() {
    let server = start(fixture_table());
    let addr = server.addr();

    let res = get(addr, "/v0/test");
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "OK");
    assert!(res.header("content-type").unwrap().starts_with("text/plain"));

    let res = get(addr, "/one-middleware?x=1");
    assert_eq!(res.status, 200);
    assert!(res
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));
    let body = res.json();
    assert_eq!(body["headers"]["x-middleware"], "OK");
    assert_eq!(body["query"]["x"], "1");

    let res = get(addr, "/parameters-schema/7");
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["params"]["id"], 7);

    server.stop();
}

#[test]
fn test_validation_over_http() {
    let server = start(fixture_table());
    let addr = server.addr();

    let res = post_json(addr, "/body-schema", r#"{"id": 1}"#);
    assert_eq!(res.status, 200);

    let res = post_json(addr, "/body-schema", r#"{"id": "string"}"#);
    assert_eq!(res.status, 422);
    assert_eq!(res.json()["error"], "INVALID_INPUT");

    let res = get(addr, "/invalid-schema");
    assert_eq!(res.status, 400);
    assert_eq!(res.json()["path"], "/invalid-schema");

    server.stop();
}

#[test]
fn test_unknown_route_is_404() {
    let server = start(fixture_table());
    let res = get(server.addr(), "/no-such-route");
    assert_eq!(res.status, 404);
    assert_eq!(res.json()["error"], "Not Found");
    server.stop();
}

#[test]
fn test_health_endpoint() {
    let server = start(RouteTable::default());
    let res = get(server.addr(), "/health");
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["status"], "ok");
    server.stop();
}

#[test]
fn test_excess_response_headers_are_dropped() {
    let root = RouterNode::new();
    root.get("/many-headers", |_ctx| {
        let mut res = Response::json(serde_json::json!({ "ok": true }));
        for i in 0..20 {
            res.set_header(&format!("x-extra-{i}"), i.to_string());
        }
        Ok(res)
    });
    let server = start(root.build().unwrap());

    let res = get(server.addr(), "/many-headers");
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["ok"], true);
    assert!(res
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));
    let extras = res
        .headers
        .iter()
        .filter(|(name, _)| name.starts_with("x-extra-"))
        .count();
    assert_eq!(extras, WIRE_HEADER_LIMIT - 1);
    assert_eq!(res.header("x-extra-0"), Some("0"));

    // Same lines again, served from the interned copies.
    assert_eq!(get(server.addr(), "/many-headers").status, 200);
    server.stop();
}
