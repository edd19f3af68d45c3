use crate::errors::{ErrorResult, HarnessError};
use crate::managers::composer::{RawParams, RequestComposer, RequestSpec};
use crate::managers::normalizer::{normalize_raw, ResponseEnvelope};
use crate::managers::registry::{self, AuthScheme, EndpointDescriptor};
use crate::managers::relay::{HttpRelay, RelayExecutor};
use crate::managers::resolver::{self, ConnectionCredential, ConnectionSummary};
use crate::services::config::HarnessConfig;
use crate::services::logger::Logger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    Validating,
    Dispatching,
    Awaiting,
    Success,
    Error,
}

/// Inbound call from the presentation side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub endpoint_id: String,
    #[serde(default, deserialize_with = "lenient_params")]
    pub raw_params: RawParams,
    #[serde(default)]
    pub connection_index: Option<usize>,
}

/// Form fields arrive as strings, but scripted callers often send numbers
/// or booleans. Those are rendered to text; nulls are dropped.
fn lenient_params<'de, D>(deserializer: D) -> Result<RawParams, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<serde_json::Map<String, Value>> = Option::deserialize(deserializer)?;
    let mut params = RawParams::new();
    for (name, value) in raw.unwrap_or_default() {
        let text = match value {
            Value::Null => continue,
            Value::String(text) => text,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "rawParams.{} must be a string, number or boolean, got {}",
                    name, other
                )))
            }
        };
        params.insert(name, text);
    }
    Ok(params)
}

impl InvocationRequest {
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw_params.insert(name.into(), value.into());
        self
    }

    pub fn connection(mut self, index: usize) -> Self {
        self.connection_index = Some(index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvocationOutcome {
    Success(ResponseEnvelope),
    Failure(ErrorResult),
}

impl InvocationOutcome {
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            InvocationOutcome::Success(envelope) => Some(envelope),
            InvocationOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorResult> {
        match self {
            InvocationOutcome::Success(_) => None,
            InvocationOutcome::Failure(err) => Some(err),
        }
    }

    /// An envelope with a 2xx status. A delivered 404 is not ok, even
    /// though the invocation itself succeeded.
    pub fn is_ok(&self) -> bool {
        self.envelope().is_some_and(ResponseEnvelope::is_success)
    }

    /// Caller-facing view: the envelope or error fields plus an `ok` flag.
    pub fn to_result(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("ok".to_string(), Value::Bool(self.is_ok()));
        }
        value
    }
}

/// One finished test cycle: its id, every state it passed through, and the
/// result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationReport {
    pub id: Uuid,
    pub endpoint_id: String,
    pub states: Vec<InvocationState>,
    pub outcome: InvocationOutcome,
}

struct Cycle {
    id: Uuid,
    states: Vec<InvocationState>,
}

impl Cycle {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            states: vec![InvocationState::Idle],
        }
    }

    fn enter(&mut self, state: InvocationState) {
        self.states.push(state);
    }

    fn finish(mut self, endpoint_id: &str, outcome: InvocationOutcome) -> InvocationReport {
        self.states.push(InvocationState::Idle);
        InvocationReport {
            id: self.id,
            endpoint_id: endpoint_id.to_string(),
            states: self.states,
            outcome,
        }
    }
}

/// Drives validate, compose, execute and normalize for one endpoint test.
/// Holds only read-only shared state, so clones can run concurrently.
#[derive(Clone)]
pub struct EndpointHarness {
    logger: Logger,
    composer: RequestComposer,
    connections: Arc<[ConnectionCredential]>,
    relay: Arc<dyn RelayExecutor>,
    timeout_ms: u64,
}

impl EndpointHarness {
    pub fn new(logger: Logger, config: &HarnessConfig, relay: Arc<dyn RelayExecutor>) -> Self {
        Self {
            logger: logger.child("harness"),
            composer: RequestComposer::new(config.api_base.clone()),
            connections: config.connections.clone().into(),
            relay,
            timeout_ms: config.timeout_ms,
        }
    }

    pub fn from_config(logger: Logger, config: &HarnessConfig) -> Result<Self, HarnessError> {
        let relay = HttpRelay::new(logger.clone(), config.relay)?;
        Ok(Self::new(logger, config, Arc::new(relay)))
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn connection_summaries(&self) -> Vec<ConnectionSummary> {
        self.connections
            .iter()
            .enumerate()
            .map(|(index, connection)| connection.summary(index))
            .collect()
    }

    /// Validation and composition only; never touches the network.
    pub fn describe(&self, request: &InvocationRequest) -> Result<RequestSpec, HarnessError> {
        let descriptor = registry::lookup(&request.endpoint_id)?;
        self.prepare(descriptor, request)
    }

    fn prepare(
        &self,
        descriptor: &EndpointDescriptor,
        request: &InvocationRequest,
    ) -> Result<RequestSpec, HarnessError> {
        let connection = match descriptor.auth_scheme {
            AuthScheme::None => None,
            AuthScheme::QueryToken | AuthScheme::Bearer => Some(resolver::resolve(
                &self.connections,
                request.connection_index.unwrap_or(0),
            )?),
        };
        self.composer
            .compose(descriptor, connection, &request.raw_params)
    }

    pub async fn test(&self, request: &InvocationRequest) -> InvocationReport {
        self.invoke(request, &CancellationToken::new()).await
    }

    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        cancel: &CancellationToken,
    ) -> InvocationReport {
        let mut cycle = Cycle::start();
        cycle.enter(InvocationState::Validating);

        let spec = match self.describe(request) {
            Ok(spec) => spec,
            Err(err) => {
                self.logger.debug(
                    "endpoint test rejected before dispatch",
                    Some(&serde_json::json!({
                        "invocation": cycle.id,
                        "endpoint": request.endpoint_id,
                        "code": err.code(),
                    })),
                );
                cycle.enter(InvocationState::Error);
                return cycle.finish(&request.endpoint_id, InvocationOutcome::Failure(err.into()));
            }
        };

        cycle.enter(InvocationState::Dispatching);
        self.logger.debug(
            "dispatching endpoint test",
            Some(&serde_json::json!({"invocation": cycle.id, "request": spec.redacted()})),
        );
        cycle.enter(InvocationState::Awaiting);
        let outcome = match self.relay.execute(&spec, self.timeout_ms, cancel).await {
            Ok(raw) => {
                cycle.enter(InvocationState::Success);
                InvocationOutcome::Success(normalize_raw(raw))
            }
            Err(err) => {
                self.logger.warn(
                    "endpoint test transport failure",
                    Some(&serde_json::json!({
                        "invocation": cycle.id,
                        "endpoint": request.endpoint_id,
                        "kind": err.kind,
                    })),
                );
                cycle.enter(InvocationState::Error);
                InvocationOutcome::Failure(HarnessError::from(err).into())
            }
        };
        cycle.finish(&request.endpoint_id, outcome)
    }
}

/// Presentation-side holder of the most recent result. A new run discards
/// the previous report before it starts.
pub struct TestSession {
    harness: EndpointHarness,
    last: Option<InvocationReport>,
}

impl TestSession {
    pub fn new(harness: EndpointHarness) -> Self {
        Self {
            harness,
            last: None,
        }
    }

    pub fn harness(&self) -> &EndpointHarness {
        &self.harness
    }

    pub async fn run(
        &mut self,
        request: &InvocationRequest,
        cancel: &CancellationToken,
    ) -> &InvocationReport {
        self.last = None;
        let report = self.harness.invoke(request, cancel).await;
        self.last.insert(report)
    }

    pub fn last(&self) -> Option<&InvocationReport> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) -> bool {
        self.last.take().is_some()
    }
}
