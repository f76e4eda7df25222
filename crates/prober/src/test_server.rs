//! Loopback HTTP server answering every request from a fixed responder

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Running server: base URL plus the request heads it has seen.
pub(crate) struct CannedServer {
    pub url: String,
    heads: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let heads = Arc::new(Mutex::new(Vec::new()));
        let respond: Responder = Arc::new(respond);

        let seen = heads.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(answer(socket, respond.clone(), seen.clone()));
            }
        });

        Self { url, heads }
    }

    /// First line of every request received so far.
    pub fn request_lines(&self) -> Vec<String> {
        self.heads
            .lock()
            .iter()
            .filter_map(|h| h.lines().next().map(str::to_owned))
            .collect()
    }
}

/// Raw HTTP/1.1 response that closes the connection after the body.
pub(crate) fn response(status: u16, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!(
        "HTTP/1.1 {status} Canned\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

async fn answer(mut socket: TcpStream, respond: Responder, heads: Arc<Mutex<Vec<String>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let body_len = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    // drain the request body so closing the socket does not reset it
    while buf.len() < head_end + body_len {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let reply = respond(&head);
    heads.lock().push(head);
    let _ = socket.write_all(reply.as_bytes()).await;
    let _ = socket.shutdown().await;
}
