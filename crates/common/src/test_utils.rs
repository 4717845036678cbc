//! Canned HTTP server for exercising remote clients in tests.

use std::sync::{Arc, Mutex};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Replies served for requests whose method matches and whose path (query
/// included) starts with `path`. Replies are served in order and the last one
/// repeats.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub replies: Vec<(u16, String)>,
}

impl Route {
    pub fn get(path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            replies: vec![(status, body.into())],
        }
    }

    pub fn post(path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: "POST",
            path: path.into(),
            replies: vec![(status, body.into())],
        }
    }

    /// Appends a reply served after the previous ones.
    pub fn then(mut self, status: u16, body: impl Into<String>) -> Self {
        self.replies.push((status, body.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<(Route, usize)>,
    requests: Vec<RecordedRequest>,
}

/// Serves the given routes on a random local port until dropped with the
/// runtime. Unknown paths get a 404.
#[derive(Debug, Clone)]
pub struct StubServer {
    url: String,
    state: Arc<Mutex<State>>,
}

impl StubServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            routes: routes.into_iter().map(|r| (r, 0)).collect(),
            requests: Vec::new(),
        }));

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    return;
                };
                let state = server_state.clone();
                tokio::spawn(async move {
                    let _ = handle_conn(sock, state).await;
                });
            }
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Base url, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `host:port` of the server.
    pub fn host(&self) -> &str {
        self.url.trim_start_matches("http://")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of requests that hit a path starting with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }
}

async fn handle_conn(mut sock: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = sock.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let (status, reply) = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            body,
        });
        match state
            .routes
            .iter_mut()
            .find(|(r, _)| r.method == method && path.starts_with(&r.path))
        {
            Some((route, served)) => {
                let idx = (*served).min(route.replies.len() - 1);
                *served += 1;
                route.replies[idx].clone()
            }
            None => (404, "not found".to_string()),
        }
    };

    let resp = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    );
    sock.write_all(resp.as_bytes()).await?;
    sock.shutdown().await
}
