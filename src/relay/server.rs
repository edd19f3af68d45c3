use crate::errors::{ErrorResult, HarnessError, RpcError};
use crate::managers::harness::{EndpointHarness, InvocationRequest, TestSession};
use crate::managers::registry;
use crate::relay::protocol::{parse_line, JsonRpcRequest, JsonRpcResponse};
use crate::services::config::HarnessConfig;
use crate::services::logger::Logger;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;

pub const SERVER_NAME: &str = "consult-relay";

const METHODS: &[&str] = &[
    "endpoint_list",
    "endpoint_describe",
    "endpoint_test",
    "session_last",
    "session_clear",
    "connection_list",
];

/// Line-delimited JSON-RPC front door. Each request is answered before the
/// next line is read, so one server owns one session.
pub struct RelayServer {
    logger: Logger,
    session: TestSession,
    shutdown: CancellationToken,
}

impl RelayServer {
    pub fn new(logger: Logger, harness: EndpointHarness) -> Self {
        Self {
            logger: logger.child("server"),
            session: TestSession::new(harness),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token aborts the in-flight upstream call, if any.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let result = self.dispatch(&request.method, request.params).await;
        let id = request.id?;
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    async fn dispatch(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "endpoint_list" => Ok(endpoint_list()),
            "endpoint_describe" => {
                let request = parse_invocation(params)?;
                Ok(match self.session.harness().describe(&request) {
                    Ok(spec) => spec.redacted(),
                    Err(err) => error_value(&err),
                })
            }
            "endpoint_test" => {
                let request = parse_invocation(params)?;
                let cancel = self.shutdown.child_token();
                let report = self.session.run(&request, &cancel).await;
                Ok(report.outcome.to_result())
            }
            "session_last" => match self.session.last() {
                Some(report) => to_value(report),
                None => Ok(Value::Null),
            },
            "session_clear" => Ok(serde_json::json!({"cleared": self.session.clear()})),
            "connection_list" => to_value(&self.session.harness().connection_summaries()),
            other => {
                self.logger
                    .debug("unknown method", Some(&serde_json::json!({"method": other})));
                Err(RpcError::method_not_found(other))
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        match parse_line(line) {
            Ok(request) => self.handle_request(request).await,
            Err(rejected) => {
                self.logger.debug(
                    "rejected line",
                    Some(&serde_json::json!({"error": rejected.error.message})),
                );
                rejected
                    .reply_to
                    .map(|id| JsonRpcResponse::failure(id, rejected.error))
            }
        }
    }

    pub async fn serve<R, W>(&mut self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);
        self.logger.info(
            "relay server ready",
            Some(&serde_json::json!({"methods": METHODS})),
        );
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(response) = self.handle_line(trimmed).await else {
                continue;
            };
            let payload = serde_json::to_string(&response)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }
}

fn parse_invocation(params: Value) -> Result<InvocationRequest, RpcError> {
    serde_json::from_value(params)
        .map_err(|err| RpcError::invalid_params(format!("Invalid endpoint call: {}", err)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::internal(err.to_string()))
}

fn error_value(err: &HarnessError) -> Value {
    serde_json::to_value(ErrorResult::from(err)).unwrap_or(Value::Null)
}

pub fn endpoint_list() -> Value {
    let endpoints: Vec<Value> = registry::all()
        .map(|descriptor| {
            serde_json::json!({
                "id": descriptor.id,
                "method": descriptor.method,
                "apiVersion": descriptor.api_version,
                "authScheme": descriptor.auth_scheme,
                "path": descriptor.path_template,
                "required": descriptor.required_params().collect::<Vec<_>>(),
                "defaults": descriptor.default_params(),
                "summary": descriptor.summary,
            })
        })
        .collect();
    Value::Array(endpoints)
}

pub async fn run_stdio() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let logger = Logger::new(SERVER_NAME);
    let config = HarnessConfig::from_env()?;
    if config.connections.is_empty() {
        logger.warn("no upstream connection configured", None);
    }
    let harness = EndpointHarness::from_config(logger.clone(), &config)?;
    let mut server = RelayServer::new(logger.clone(), harness);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}
