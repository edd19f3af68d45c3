use crate::constants::params::{TOKEN, WEBSITE_PROPERTY_ID};
use crate::constants::upstream::{DEFAULT_V1_BASE_URL, DEFAULT_V2_BASE_URL};
use crate::errors::HarnessError;
use crate::managers::registry::{
    ApiVersion, AuthScheme, EndpointDescriptor, EndpointId, HttpMethod, ParamKind, ParamLocation,
    ParamSpec,
};
use crate::managers::resolver::ConnectionCredential;
use crate::services::validation::Validation;
use crate::utils::redact::redact_object;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

pub type RawParams = BTreeMap<String, String>;

/// Base URL per calling convention. Both always end with `/` so that
/// relative path templates extend them instead of replacing the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    v1: Url,
    v2: Url,
}

impl ApiBase {
    pub fn new(v1: &str, v2: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            v1: parse_base(v1, "v1")?,
            v2: parse_base(v2, "v2")?,
        })
    }

    pub fn for_version(&self, version: ApiVersion) -> &Url {
        match version {
            ApiVersion::V1 => &self.v1,
            ApiVersion::V2 => &self.v2,
        }
    }
}

impl Default for ApiBase {
    fn default() -> Self {
        Self {
            v1: Url::parse(DEFAULT_V1_BASE_URL).expect("default v1 base url"),
            v2: Url::parse(DEFAULT_V2_BASE_URL).expect("default v2 base url"),
        }
    }
}

fn parse_base(raw: &str, label: &str) -> Result<Url, HarnessError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&normalized).map_err(|err| {
        HarnessError::invalid_configuration(format!("{} base url is invalid: {}", label, err))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HarnessError::invalid_configuration(format!(
            "{} base url must use http or https",
            label
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(HarnessError::invalid_configuration(format!(
            "{} base url must not carry a query or fragment",
            label
        )));
    }
    Ok(url)
}

/// A fully composed upstream request. Only the composer builds these, so
/// every instance has passed parameter validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    endpoint: EndpointId,
    method: HttpMethod,
    url: String,
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

impl RequestSpec {
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Header names are stored lower-cased.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Request detail with credentials masked, safe to show or log.
    pub fn redacted(&self) -> Value {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        redact_object(&raw, usize::MAX, &[])
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TypedValue {
    Integer(u64),
    Text(String),
}

impl TypedValue {
    fn to_json(&self) -> Value {
        match self {
            TypedValue::Integer(n) => Value::from(*n),
            TypedValue::Text(text) => Value::String(text.clone()),
        }
    }

    fn render(&self) -> String {
        match self {
            TypedValue::Integer(n) => n.to_string(),
            TypedValue::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestComposer {
    base: ApiBase,
    validation: Validation,
}

impl RequestComposer {
    pub fn new(base: ApiBase) -> Self {
        Self {
            base,
            validation: Validation::new(),
        }
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    /// Builds the request for `descriptor`. Presence of every required
    /// parameter is checked first, then each value is validated by type.
    /// Blank values count as absent; unknown parameters are ignored.
    pub fn compose(
        &self,
        descriptor: &EndpointDescriptor,
        connection: Option<&ConnectionCredential>,
        params: &RawParams,
    ) -> Result<RequestSpec, HarnessError> {
        let merged = merge_with_defaults(descriptor, params);
        if let Some(missing) = descriptor
            .required_params()
            .find(|name| !merged.contains_key(name))
        {
            return Err(HarnessError::missing_parameter(missing));
        }

        let mut typed: Vec<(&'static ParamSpec, TypedValue)> = Vec::new();
        for spec in descriptor.params {
            if let Some(raw) = merged.get(spec.name) {
                typed.push((spec, self.coerce(spec, raw)?));
            }
        }

        let connection = match descriptor.auth_scheme {
            AuthScheme::None => None,
            AuthScheme::QueryToken | AuthScheme::Bearer => {
                Some(connection.ok_or(HarnessError::NoConfiguredConnection)?)
            }
        };

        let mut path = descriptor.path_template.to_string();
        for (spec, value) in typed.iter().filter(|(s, _)| s.location == ParamLocation::Path) {
            path = path.replace(&format!("{{{}}}", spec.name), &value.render());
        }
        if path.contains('{') {
            return Err(HarnessError::invalid_configuration(format!(
                "path template for {} has an unfilled placeholder",
                descriptor.id
            )));
        }
        let mut url = self
            .base
            .for_version(descriptor.api_version)
            .join(&path)
            .map_err(|err| {
                HarnessError::invalid_configuration(format!(
                    "cannot build url for {}: {}",
                    descriptor.id, err
                ))
            })?;

        let mut headers = BTreeMap::new();
        let mut payload: Vec<(&'static str, Value)> = Vec::new();
        match (descriptor.auth_scheme, connection) {
            (AuthScheme::QueryToken, Some(conn)) => {
                payload.push((TOKEN, Value::String(conn.token().to_string())));
                payload.push((WEBSITE_PROPERTY_ID, Value::from(conn.website_property_id())));
            }
            (AuthScheme::Bearer, Some(conn)) => {
                headers.insert(
                    "authorization".to_string(),
                    format!("Bearer {}", conn.token()),
                );
                if descriptor.requires_identity {
                    payload.push((WEBSITE_PROPERTY_ID, Value::from(conn.website_property_id())));
                }
            }
            _ => {}
        }
        for (spec, value) in typed.iter().filter(|(s, _)| s.location == ParamLocation::Payload) {
            payload.push((spec.wire_name, value.to_json()));
        }

        let body = match descriptor.method {
            HttpMethod::Get => {
                let pairs: Vec<(&str, String)> = payload
                    .iter()
                    .map(|(key, value)| (*key, render_query_value(value)))
                    .collect();
                if !pairs.is_empty() {
                    let encoded = serde_urlencoded::to_string(&pairs).map_err(|err| {
                        HarnessError::invalid_configuration(format!(
                            "cannot encode query for {}: {}",
                            descriptor.id, err
                        ))
                    })?;
                    url.set_query(Some(&encoded));
                }
                None
            }
            HttpMethod::Post => Some(Value::Object(
                payload
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect(),
            )),
        };

        Ok(RequestSpec {
            endpoint: descriptor.id,
            method: descriptor.method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    fn coerce(&self, spec: &ParamSpec, raw: &str) -> Result<TypedValue, HarnessError> {
        match spec.kind {
            ParamKind::PositiveInteger => self
                .validation
                .ensure_positive_integer(raw, spec.name)
                .map(TypedValue::Integer),
            ParamKind::Date => self
                .validation
                .ensure_date(raw, spec.name)
                .map(|date| TypedValue::Text(date.format("%Y-%m-%d").to_string())),
            ParamKind::Text => self
                .validation
                .ensure_text(raw, spec.name)
                .map(TypedValue::Text),
        }
    }
}

fn merge_with_defaults<'a>(
    descriptor: &EndpointDescriptor,
    params: &'a RawParams,
) -> BTreeMap<&'static str, &'a str> {
    descriptor
        .params
        .iter()
        .filter_map(|spec| {
            params
                .get(spec.name)
                .map(String::as_str)
                .filter(|value| !value.trim().is_empty())
                .or(spec.default)
                .map(|value| (spec.name, value))
        })
        .collect()
}

fn render_query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
