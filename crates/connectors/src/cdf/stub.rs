//! Local HTTP/1.1 server standing in for the identity provider and CDF RAW.
//!
//! `POST /token` issues `tok-1`, `tok-2`, ... in order. Any other request is
//! answered with the next scripted status, or 200 once the script is used up.

use reqwest::{Client, Url};
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct StubState {
    statuses: VecDeque<u16>,
    tokens_issued: usize,
    seen: Vec<SeenRequest>,
}

pub struct StubCdf {
    addr: SocketAddr,
    state: Arc<Mutex<StubState>>,
}

impl StubCdf {
    pub async fn start(statuses: Vec<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(StubState {
            statuses: statuses.into(),
            ..StubState::default()
        }));

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&shared)));
            }
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{path}", self.addr)).unwrap()
    }

    pub fn token_requests(&self) -> usize {
        self.state.lock().unwrap().tokens_issued
    }

    /// `Authorization` headers of every non-token request, in arrival order.
    pub fn api_authorizations(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .seen
            .iter()
            .filter(|r| !r.path.starts_with("/token"))
            .map(|r| r.authorization.clone().unwrap_or_default())
            .collect()
    }
}

/// Client that never goes through a proxy configured in the environment.
pub fn http() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<StubState>>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    let (status, body) = {
        let mut state = state.lock().unwrap();
        state.seen.push(request.clone());
        if request.path.starts_with("/token") {
            state.tokens_issued += 1;
            (
                200,
                format!(
                    r#"{{"access_token":"tok-{}","token_type":"Bearer","expires_in":3600}}"#,
                    state.tokens_issued
                ),
            )
        } else {
            match state.statuses.pop_front().unwrap_or(200) {
                200 => (200, "{}".to_string()),
                status => (
                    status,
                    format!(r#"{{"error":{{"code":{status},"message":"scripted failure"}}}}"#),
                ),
            }
        }
    };

    let response = format!(
        "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        reason(status),
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();

    let mut authorization = None;
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.eq_ignore_ascii_case("authorization") {
            authorization = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }

    let mut body_read = buf.len() - head_end;
    while body_read < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body_read += n;
    }

    Some(SeenRequest {
        path,
        authorization,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        503 => "Service Unavailable",
        _ => "Error",
    }
}
