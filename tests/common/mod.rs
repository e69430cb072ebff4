//! A tiny HTTP/1.1 server standing in for the `entries:write` endpoint.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    /// Request line and headers, as received.
    pub head: String,
    pub body: Value,
}

impl CapturedRequest {
    /// Value of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    }
}

pub struct TestServer {
    pub url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl TestServer {
    /// Answer every request with `status` and `body`.
    pub async fn start(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v2/entries:write", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, status, body, Arc::clone(&captured)));
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Messages of every entry received so far, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.requests()
            .iter()
            .flat_map(|r| r.body["entries"].as_array().cloned().unwrap_or_default())
            .map(|e| e["jsonPayload"]["message"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn serve(mut stream: TcpStream, status: u16, reply: &'static str, requests: Arc<Mutex<Vec<CapturedRequest>>>) {
    let mut buf = Vec::new();
    loop {
        let head_len = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if !read_more(&mut stream, &mut buf).await {
                return;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_len]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim().eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);

        while buf.len() < head_len + content_length {
            if !read_more(&mut stream, &mut buf).await {
                return;
            }
        }

        let body = serde_json::from_slice(&buf[head_len..head_len + content_length]).unwrap_or(Value::Null);
        buf.drain(..head_len + content_length);
        requests.lock().unwrap().push(CapturedRequest { head, body });

        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            status,
            if status < 300 { "OK" } else { "Error" },
            reply.len(),
            reply
        );
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn read_more(stream: &mut TcpStream, buf: &mut Vec<u8>) -> bool {
    let mut chunk = [0u8; 4096];
    match stream.read(&mut chunk).await {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            true
        }
    }
}
