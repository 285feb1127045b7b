#![allow(dead_code)]

pub mod fixtures {
    use kudy::middleware::SetRequestHeader;
    use kudy::{
        LoaderOptions, ManifestResolver, Registry, Response, RouteDefinition, RouteLoader,
        RouteTable, RouterNode,
    };
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    /// Construct parameters handed to fixture factories and decorators.
    #[derive(Debug, Clone)]
    pub struct RouteParams {
        pub router_test_route_path: String,
    }

    impl Default for RouteParams {
        fn default() -> Self {
            Self {
                router_test_route_path: "/router-test-route".to_string(),
            }
        }
    }

    pub fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    pub fn routes_dir() -> PathBuf {
        fixtures_dir().join("routes")
    }

    pub fn error_routes_dir() -> PathBuf {
        fixtures_dir().join("error_routes")
    }

    fn header(name: &str) -> Arc<SetRequestHeader> {
        Arc::new(SetRequestHeader::new(name, "OK"))
    }

    /// Everything the fixture manifests refer to by name.
    pub fn registry() -> Registry<RouteParams> {
        let mut registry = Registry::with_builtins();
        registry
            .register_handler("throwError", |_ctx| Err(anyhow::anyhow!("Wanted exception")))
            .register_middleware("xMiddleware", header("x-middleware"))
            .register_middleware("xPreMiddleware", header("x-pre-middleware"))
            .register_middleware("xMiddleware1", header("x-middleware-1"))
            .register_middleware("xMiddleware2", header("x-middleware-2"))
            .register_middleware("xPreMiddleware1", header("x-pre-middleware-1"))
            .register_middleware("xPreMiddleware2", header("x-pre-middleware-2"))
            .register_factory("getAsyncRoute", |_params: &RouteParams| {
                std::thread::sleep(Duration::from_millis(20));
                Ok(RouteDefinition::get("/async", |_ctx| Ok(Response::default())).into_route())
            })
            .register_decorator("rootRoutes", |parent: &RouterNode, params: &RouteParams| {
                parent.get(&params.router_test_route_path, |_ctx| Ok(Response::default()));
                Ok(parent.clone())
            })
            .register_decorator("asyncHeader", |parent: &RouterNode, _params: &RouteParams| {
                std::thread::sleep(Duration::from_millis(20));
                parent.use_middleware(header("x-async-header"));
                Ok(parent.clone())
            });
        registry
    }

    pub fn loader(options: LoaderOptions) -> RouteLoader<RouteParams, ManifestResolver<RouteParams>> {
        RouteLoader::with_options(
            RouteParams::default(),
            ManifestResolver::new(registry()),
            options,
        )
    }

    /// Options whose handlers answer `{path}` with 404 for errors and 400
    /// for invalid input.
    pub fn own_handler_options() -> LoaderOptions {
        LoaderOptions::default()
            .with_error_catch_handler(|_err, ctx| {
                Response::json(json!({ "path": ctx.path })).with_status(404)
            })
            .with_invalid_input_handler(|_failure, ctx| {
                Response::json(json!({ "path": ctx.path })).with_status(400)
            })
    }

    /// Both fixture trees on one root: `routes` with the default policy and
    /// `error_routes` with [`own_handler_options`].
    pub fn fixture_router() -> RouterNode {
        let root = RouterNode::new();
        loader(LoaderOptions::default())
            .append_routes_from_dir(&root, routes_dir())
            .unwrap();
        loader(own_handler_options())
            .append_routes_from_dir(&root, error_routes_dir())
            .unwrap();
        root
    }

    pub fn fixture_table() -> RouteTable {
        fixture_router().build().unwrap()
    }
}

pub mod test_server {
    use kudy::server::{AppService, HttpServer, ServerHandle};
    use kudy::RouteTable;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Once;
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    pub fn start(table: RouteTable) -> ServerHandle {
        setup_may_runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handle = HttpServer(AppService::new(table)).start(addr).unwrap();
        handle.wait_ready().unwrap();
        handle
    }

    pub fn send_request(addr: SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if response_complete(&buf) {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn response_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    pub struct ParsedResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl ParsedResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap_or_default()
        }
    }

    pub fn parse_response(resp: &str) -> ParsedResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();
        ParsedResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    pub fn get(addr: SocketAddr, path: &str) -> ParsedResponse {
        let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        parse_response(&send_request(addr, &req))
    }

    pub fn post_json(addr: SocketAddr, path: &str, body: &str) -> ParsedResponse {
        let req = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        parse_response(&send_request(addr, &req))
    }
}
