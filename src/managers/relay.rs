use crate::constants::network::{MAX_BODY_BYTES, MAX_REDIRECTS, TIMEOUT_RELAY_REQUEST_MS};
use crate::constants::relay::{
    ACCEPT_JSON, CLIENT_NAME, CLIENT_VERSION, CONTENT_TYPE_JSON, HEADER_CLIENT, HEADER_VERSION,
};
use crate::errors::{HarnessError, TransportError, TransportErrorKind};
use crate::managers::composer::RequestSpec;
use crate::managers::registry::HttpMethod;
use crate::services::logger::Logger;
use crate::utils::redact::redact_text;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// What came back over the wire, before any interpretation of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub elapsed_ms: u64,
    pub truncated: bool,
    /// Set when the captured bytes were not valid UTF-8 and had to be
    /// decoded with replacement characters.
    pub lossy: bool,
}

/// Performs exactly one outbound attempt for a composed request.
#[async_trait]
pub trait RelayExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &RequestSpec,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub verify_tls: bool,
    pub diagnostics: bool,
    pub max_body_bytes: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            verify_tls: true,
            diagnostics: false,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

pub struct HttpRelay {
    client: Client,
    logger: Logger,
    settings: RelaySettings,
}

impl HttpRelay {
    pub fn new(logger: Logger, settings: RelaySettings) -> Result<Self, HarnessError> {
        let logger = logger.child("relay");
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if !settings.verify_tls {
            logger.warn(
                "TLS certificate verification is disabled for upstream requests",
                Some(&serde_json::json!({"verify_tls": false})),
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|err| {
            HarnessError::invalid_configuration(format!("Failed to build HTTP client: {}", err))
        })?;
        Ok(Self {
            client,
            logger,
            settings,
        })
    }

    pub fn settings(&self) -> RelaySettings {
        self.settings
    }

    async fn send(
        &self,
        spec: &RequestSpec,
        started: Instant,
    ) -> Result<RawResponse, TransportError> {
        let method = match spec.method() {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut request = self
            .client
            .request(method, spec.url())
            .headers(to_header_map(&outbound_headers(spec))?);
        if let Some(body) = spec.body() {
            let bytes = serde_json::to_vec(body).map_err(|err| {
                TransportError::new(TransportErrorKind::Other, format!("Cannot encode body: {}", err))
            })?;
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(|err| classify_reqwest_error(&err))?;
        let status = response.status().as_u16();
        let headers = headers_to_map(response.headers());

        let limit = self.settings.max_body_bytes;
        let mut buffer: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| classify_reqwest_error(&err))?;
            let remaining = limit.saturating_sub(buffer.len());
            if chunk.len() > remaining {
                buffer.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            buffer.extend_from_slice(&chunk);
        }

        let (body, lossy) = decode_body(buffer, truncated);
        Ok(RawResponse {
            status,
            body,
            headers,
            elapsed_ms: started.elapsed().as_millis() as u64,
            truncated,
            lossy,
        })
    }
}

#[async_trait]
impl RelayExecutor for HttpRelay {
    async fn execute(
        &self,
        spec: &RequestSpec,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let timeout_ms = if timeout_ms == 0 {
            TIMEOUT_RELAY_REQUEST_MS
        } else {
            timeout_ms
        };
        let started = Instant::now();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::cancelled()),
            result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.send(spec, started)) => {
                result.unwrap_or_else(|_| Err(TransportError::timeout(timeout_ms)))
            }
        };

        if self.settings.diagnostics {
            let meta = diagnostics_meta(spec, started.elapsed().as_millis() as u64, &outcome);
            self.logger.info("relay request", Some(&meta));
        }
        outcome
    }
}

/// Diagnostics carry the host only, never the full URL, so a query-embedded
/// token cannot reach the log.
pub(crate) fn diagnostics_meta(
    spec: &RequestSpec,
    duration_ms: u64,
    outcome: &Result<RawResponse, TransportError>,
) -> serde_json::Value {
    let mut meta = serde_json::json!({
        "method": spec.method().as_str(),
        "host": spec.host(),
        "endpoint": spec.endpoint().as_str(),
        "duration_ms": duration_ms,
    });
    match outcome {
        Ok(raw) => {
            meta["status"] = serde_json::json!(raw.status);
            meta["truncated"] = serde_json::json!(raw.truncated);
        }
        Err(err) => meta["error"] = serde_json::json!(err.kind),
    }
    meta
}

/// A capped body may end inside a multi-byte character; that tail is dropped
/// rather than decoded into a replacement character.
fn decode_body(mut buffer: Vec<u8>, truncated: bool) -> (String, bool) {
    if truncated {
        if let Err(err) = std::str::from_utf8(&buffer) {
            if err.error_len().is_none() {
                buffer.truncate(err.valid_up_to());
            }
        }
    }
    match String::from_utf8(buffer) {
        Ok(text) => (text, false),
        Err(err) => (String::from_utf8_lossy(err.as_bytes()).into_owned(), true),
    }
}

/// Headers actually sent: the composed ones, plus content-type, accept,
/// user-agent and relay identification where the composed request left them unset.
pub fn outbound_headers(spec: &RequestSpec) -> BTreeMap<String, String> {
    let mut headers = spec.headers().clone();
    let defaults = [
        ("content-type", CONTENT_TYPE_JSON.to_string()),
        ("accept", ACCEPT_JSON.to_string()),
        ("user-agent", format!("{}/{}", CLIENT_NAME, CLIENT_VERSION)),
        (HEADER_CLIENT, CLIENT_NAME.to_string()),
        (HEADER_VERSION, CLIENT_VERSION.to_string()),
    ];
    for (name, value) in defaults {
        headers.entry(name.to_string()).or_insert(value);
    }
    headers
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            TransportError::new(TransportErrorKind::Other, format!("Invalid header name: {}", name))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::new(
                TransportErrorKind::Other,
                format!("Invalid value for header {}", name),
            )
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(text) = value.to_str() else {
            continue;
        };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(text);
            })
            .or_insert_with(|| text.to_string());
    }
    out
}

/// Joins the error and its causes, skipping causes whose text is already
/// part of the message. Also reports whether a refused or TLS-layer io error
/// sits in the chain.
fn describe_chain(err: &reqwest::Error) -> (String, TransportErrorKind) {
    let mut text = err.to_string();
    let mut refused = false;
    let mut invalid_data = false;
    let mut causes = String::new();
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            refused |= io.kind() == std::io::ErrorKind::ConnectionRefused;
            invalid_data |= io.kind() == std::io::ErrorKind::InvalidData;
        }
        let segment = inner.to_string();
        if !segment.is_empty() && !text.contains(&segment) {
            text.push_str(": ");
            text.push_str(&segment);
        }
        causes.push_str(&segment.to_lowercase());
        causes.push('\n');
        source = inner.source();
    }
    let kind = if refused {
        TransportErrorKind::ConnectionRefused
    } else if !err.is_connect() {
        TransportErrorKind::Other
    } else if invalid_data {
        // rustls reports handshake failures as InvalidData io errors
        TransportErrorKind::Tls
    } else {
        classify_causes(&causes)
    };
    (text, kind)
}

/// Looks only at the cause chain. The top-level message embeds the request
/// URL, and a host named like `api-ssl` says nothing about the handshake.
fn classify_causes(causes: &str) -> TransportErrorKind {
    if causes.contains("connection refused") {
        TransportErrorKind::ConnectionRefused
    } else if causes.contains("certificate")
        || causes.contains("handshake")
        || causes.contains("received fatal alert")
    {
        TransportErrorKind::Tls
    } else {
        TransportErrorKind::Other
    }
}

pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    let (chain, kind) = describe_chain(err);
    let message = redact_text(&chain, 1024, &[]);
    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Timeout, message);
    }
    TransportError::new(kind, message)
}
