use crate::errors::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// No id, no answer.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A line that could not become a request. `reply_to` is `None` when the
/// sender asked for no reply (a notification with a bad version).
#[derive(Debug)]
pub struct Rejected {
    pub reply_to: Option<Value>,
    pub error: RpcError,
}

/// Parses one stdio line. Malformed JSON and malformed envelopes are
/// answered with a null id since the sender's id cannot be trusted.
pub fn parse_line(line: &str) -> Result<JsonRpcRequest, Rejected> {
    let raw: Value = serde_json::from_str(line).map_err(|_| Rejected {
        reply_to: Some(Value::Null),
        error: RpcError::parse_error("Parse error"),
    })?;
    let request: JsonRpcRequest = serde_json::from_value(raw).map_err(|err| Rejected {
        reply_to: Some(Value::Null),
        error: RpcError::invalid_request(format!("Invalid request: {}", err)),
    })?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Rejected {
            reply_to: request.id,
            error: RpcError::invalid_request(format!("jsonrpc must be \"{}\"", JSONRPC_VERSION)),
        });
    }
    Ok(request)
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl From<RpcError> for JsonRpcError {
    fn from(error: RpcError) -> Self {
        Self {
            code: error.code.as_i32(),
            message: error.message,
        }
    }
}

/// Exactly one of `result` or `error` is emitted.
#[derive(Debug, Serialize)]
pub enum ResponseBody {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(JsonRpcError),
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Result(result),
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Error(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ResponseBody::Error(_))
    }
}
