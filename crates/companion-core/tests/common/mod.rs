//! Minimal in-process HTTP server standing in for Ollama and OpenAI.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
pub struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    content_type: &'static str,
    chunks: Vec<String>,
    delay: Duration,
}

impl Route {
    pub fn json(method: &'static str, path: &'static str, body: &str) -> Self {
        Self {
            method,
            path,
            status: 200,
            content_type: "application/json",
            chunks: vec![body.to_string()],
            delay: Duration::ZERO,
        }
    }

    /// Body written piecewise, one write per chunk.
    pub fn chunked(method: &'static str, path: &'static str, content_type: &'static str, chunks: &[&str]) -> Self {
        Self {
            method,
            path,
            status: 200,
            content_type,
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Holds the response back, as a hung backend would.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: String,
    pub body: String,
}

pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub async fn spawn(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    serve(socket, &routes, &recorded).await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

async fn serve(mut socket: TcpStream, routes: &[Route], recorded: &Mutex<Vec<Recorded>>) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };

    let route = routes
        .iter()
        .find(|r| r.method == request.method && r.path == request.path)
        .cloned();
    recorded.lock().unwrap().push(request);

    let route = route.unwrap_or_else(|| Route::json("GET", "", "not found").status(404));
    tokio::time::sleep(route.delay).await;
    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        route.status, route.content_type
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for chunk in &route.chunks {
        if socket.write_all(chunk.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(Recorded {
        method,
        path,
        headers: head,
        body,
    })
}

pub fn tags_body(models: &[&str]) -> String {
    let models: Vec<String> = models
        .iter()
        .map(|name| format!(r#"{{"name":"{name}","size":1}}"#))
        .collect();
    format!(r#"{{"models":[{}]}}"#, models.join(","))
}
