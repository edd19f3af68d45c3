#![allow(dead_code)]

use async_trait::async_trait;
use consult_relay::errors::TransportError;
use consult_relay::managers::composer::{ApiBase, RequestSpec};
use consult_relay::managers::harness::EndpointHarness;
use consult_relay::managers::relay::{RawResponse, RelayExecutor};
use consult_relay::managers::resolver::ConnectionCredential;
use consult_relay::services::config::HarnessConfig;
use consult_relay::services::logger::{LogLevel, Logger};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn quiet_logger() -> Logger {
    Logger::with_level("consult-relay-test", LogLevel::Error)
}

pub fn config_with(connections: Vec<ConnectionCredential>, base: &str) -> HarnessConfig {
    HarnessConfig {
        connections,
        api_base: ApiBase::new(&format!("{}/v1", base), &format!("{}/v2", base))
            .expect("test base urls"),
        ..HarnessConfig::default()
    }
}

pub fn default_connection() -> ConnectionCredential {
    ConnectionCredential::new("abc123", 42).expect("test connection")
}

/// Records every request it is asked to send and answers with a canned response.
pub struct SpyRelay {
    calls: AtomicUsize,
    seen: StdMutex<Vec<RequestSpec>>,
    status: u16,
    body: String,
}

impl SpyRelay {
    pub fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: StdMutex::new(Vec::new()),
            status,
            body: body.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<RequestSpec> {
        self.seen.lock().expect("spy lock").clone()
    }
}

#[async_trait]
impl RelayExecutor for SpyRelay {
    async fn execute(
        &self,
        spec: &RequestSpec,
        _timeout_ms: u64,
        _cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("spy lock").push(spec.clone());
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Ok(RawResponse {
            status: self.status,
            body: self.body.clone(),
            headers,
            elapsed_ms: 1,
            truncated: false,
            lossy: false,
        })
    }
}

pub fn spy_harness(spy: Arc<SpyRelay>) -> EndpointHarness {
    let config = config_with(vec![default_connection()], "https://api.example.com");
    EndpointHarness::new(quiet_logger(), &config, spy)
}

/// Accepts connections and never answers them.
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent server");
    let addr = listener.local_addr().expect("silent server addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// An address nothing listens on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{}", addr)
}

/// Serves exactly one canned HTTP response and hands back the raw request text.
pub async fn canned_server(
    status_line: &str,
    content_type: &str,
    body: &str,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind canned server");
    let addr = listener.local_addr().expect("canned server addr");
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        content_type,
        body.len(),
        body
    );
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let request = read_request(&mut socket).await;
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        let _ = tx.send(request);
    });
    (format!("http://{}", addr), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(read) = socket.read(&mut chunk).await else {
            break;
        };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&buffer);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let expected = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + expected {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
