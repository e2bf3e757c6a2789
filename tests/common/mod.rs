//! Minimal canned-response HTTP server for driving the engine end-to-end.
//!
//! Hand-rolled on `tokio::net::TcpListener`: routes are exact
//! `"METHOD target"` matches, every request is recorded (method, target,
//! body, cookie header), responses can be delayed to simulate a stalled ERP,
//! and a path can serve a sequence of responses for stateful login flows.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone, Debug)]
pub struct Route {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    delay: Option<Duration>,
}

impl Route {
    pub fn status(code: u16) -> Self {
        Self {
            status: code,
            headers: vec![],
            body: String::new(),
            delay: None,
        }
    }

    pub fn html(body: &str) -> Self {
        Self::status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(body)
    }

    pub fn json(body: &str) -> Self {
        Self::status(200)
            .header("content-type", "application/json")
            .body(body)
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(302).header("location", location)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cookie(self, cookie: &str) -> Self {
        self.header("set-cookie", cookie)
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Debug)]
pub struct Hit {
    pub method: String,
    pub target: String,
    pub body: String,
    pub cookie: Option<String>,
}

struct RouteEntry {
    responses: Vec<Route>,
    served: usize,
}

#[derive(Clone)]
pub struct TestErp {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, RouteEntry>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl TestErp {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let routes: Arc<Mutex<HashMap<String, RouteEntry>>> = Arc::default();
        let hits: Arc<Mutex<Vec<Hit>>> = Arc::default();

        let accept_routes = routes.clone();
        let accept_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle(sock, accept_routes.clone(), accept_hits.clone()));
            }
        });

        Self { addr, routes, hits }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn route(&self, method: &str, target: &str, route: Route) {
        self.route_seq(method, target, vec![route]);
    }

    /// Serve `responses` in order for repeated requests; the last one
    /// repeats.
    pub fn route_seq(&self, method: &str, target: &str, responses: Vec<Route>) {
        self.routes.lock().unwrap().insert(
            format!("{method} {target}"),
            RouteEntry {
                responses,
                served: 0,
            },
        );
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn was_hit(&self, method: &str, target: &str) -> bool {
        self.hits()
            .iter()
            .any(|h| h.method == method && h.target == target)
    }
}

async fn handle(
    mut sock: TcpStream,
    routes: Arc<Mutex<HashMap<String, RouteEntry>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        match sock.read(&mut tmp).await {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                    break pos + 4;
                }
            }
            Err(_) => return,
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    let mut cookie = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("cookie") {
                cookie = Some(value.trim().to_string());
            }
        }
    }

    let mut body_bytes = buf[header_end..].to_vec();
    while body_bytes.len() < content_length {
        match sock.read(&mut tmp).await {
            Ok(0) => break,
            Ok(n) => body_bytes.extend_from_slice(&tmp[..n]),
            Err(_) => break,
        }
    }

    hits.lock().unwrap().push(Hit {
        method: method.clone(),
        target: target.clone(),
        body: String::from_utf8_lossy(&body_bytes).to_string(),
        cookie,
    });

    let route = {
        let mut routes = routes.lock().unwrap();
        match routes.get_mut(&format!("{method} {target}")) {
            Some(entry) if !entry.responses.is_empty() => {
                let idx = entry.served.min(entry.responses.len() - 1);
                entry.served += 1;
                entry.responses[idx].clone()
            }
            _ => Route::status(404),
        }
    };

    if let Some(delay) = route.delay {
        tokio::time::sleep(delay).await;
    }

    let mut resp = format!("HTTP/1.1 {} {}\r\n", route.status, reason(route.status));
    for (name, value) in &route.headers {
        resp.push_str(&format!("{name}: {value}\r\n"));
    }
    resp.push_str(&format!(
        "content-length: {}\r\nconnection: close\r\n\r\n",
        route.body.len()
    ));
    resp.push_str(&route.body);

    let _ = sock.write_all(resp.as_bytes()).await;
    let _ = sock.shutdown().await;
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
