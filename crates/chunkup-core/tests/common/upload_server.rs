//! Minimal HTTP/1.1 upload service for integration tests.
//!
//! `POST /chunks` stores the body under the `X-Chunk-Index` header;
//! `POST /finalize` concatenates the stored chunks in index order and answers
//! `{"url": ...}`. One request per connection.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct UploadServerOptions {
    /// The first N chunk requests are answered with 503.
    pub fail_first_chunks: usize,
    /// The first N finalize requests are answered with 500.
    pub fail_first_finalize: usize,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub chunks: BTreeMap<usize, Vec<u8>>,
    pub chunk_hashes: BTreeMap<usize, String>,
    pub session_ids: Vec<String>,
    pub chunk_requests: usize,
    pub finalize_bodies: Vec<serde_json::Value>,
    pub assembled: Option<Vec<u8>>,
    failed_chunks: usize,
    failed_finalize: usize,
}

pub struct UploadServer {
    pub base_url: String,
    state: Arc<Mutex<ServerState>>,
}

impl UploadServer {
    pub fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }
}

/// Starts a server in a background thread. The base URL has a `/api/upload/`
/// prefix so path joining is exercised. The server runs until the process exits.
pub fn start(opts: UploadServerOptions) -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(ServerState::default()));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state, opts));
        }
    });
    UploadServer {
        base_url: format!("http://127.0.0.1:{}/api/upload", port),
        state,
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = std::str::from_utf8(&data[..header_end]).ok()?;
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: TcpStream, state: &Mutex<ServerState>, opts: UploadServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    if !req.method.eq_ignore_ascii_case("POST") {
        respond(&mut stream, "405 Method Not Allowed", b"");
        return;
    }

    match req.path.as_str() {
        "/api/upload/chunks" => {
            let mut st = state.lock().unwrap();
            st.chunk_requests += 1;
            if st.failed_chunks < opts.fail_first_chunks {
                st.failed_chunks += 1;
                drop(st);
                respond(&mut stream, "503 Service Unavailable", b"");
                return;
            }
            let index = req.header("X-Chunk-Index").and_then(|v| v.parse::<usize>().ok());
            let size = req.header("X-Chunk-Size").and_then(|v| v.parse::<usize>().ok());
            let (Some(index), Some(size)) = (index, size) else {
                drop(st);
                respond(&mut stream, "400 Bad Request", b"");
                return;
            };
            if size != req.body.len() {
                drop(st);
                respond(&mut stream, "400 Bad Request", b"");
                return;
            }
            if let Some(session) = req.header("X-Upload-Session") {
                if !st.session_ids.iter().any(|s| s == session) {
                    st.session_ids.push(session.to_string());
                }
            }
            if let Some(hash) = req.header("X-Chunk-Hash") {
                st.chunk_hashes.insert(index, hash.to_string());
            }
            st.chunks.insert(index, req.body.clone());
            drop(st);
            respond(&mut stream, "200 OK", b"{}");
        }
        "/api/upload/finalize" => {
            let mut st = state.lock().unwrap();
            let Ok(body) = serde_json::from_slice::<serde_json::Value>(&req.body) else {
                drop(st);
                respond(&mut stream, "400 Bad Request", b"");
                return;
            };
            st.finalize_bodies.push(body.clone());
            if st.failed_finalize < opts.fail_first_finalize {
                st.failed_finalize += 1;
                drop(st);
                respond(&mut stream, "500 Internal Server Error", b"");
                return;
            }
            let assembled: Vec<u8> = st.chunks.values().flatten().copied().collect();
            st.assembled = Some(assembled);
            drop(st);
            let url = format!(
                "http://files.test/{}/{}",
                body["sessionId"].as_str().unwrap_or(""),
                body["fileName"].as_str().unwrap_or("")
            );
            respond(&mut stream, "200 OK", serde_json::json!({ "url": url }).to_string().as_bytes());
        }
        _ => respond(&mut stream, "404 Not Found", b""),
    }
}
