use crate::managers::relay::RawResponse;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Response body as shown to the caller: decoded JSON when the upstream sent
/// valid JSON, otherwise the text exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeBody {
    Json(Value),
    Raw(String),
}

impl EnvelopeBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            EnvelopeBody::Json(value) => Some(value),
            EnvelopeBody::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            EnvelopeBody::Json(_) => None,
            EnvelopeBody::Raw(text) => Some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: EnvelopeBody,
    pub headers: BTreeMap<String, String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    /// The body contained invalid UTF-8 and is shown with replacement characters.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub lossy: bool,
}

impl ResponseEnvelope {
    /// 2xx. Anything else is still a valid envelope, just not a success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn normalize(
    status: u16,
    body: &str,
    headers: BTreeMap<String, String>,
    elapsed_ms: u64,
) -> ResponseEnvelope {
    let body = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => EnvelopeBody::Json(parsed),
        Err(_) => EnvelopeBody::Raw(body.to_string()),
    };
    let headers = headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();
    ResponseEnvelope {
        status,
        body,
        headers,
        duration_ms: elapsed_ms,
        truncated: false,
        lossy: false,
    }
}

/// A body cut at the capture limit is never decoded, since a prefix of a
/// JSON document may itself parse as something different. Lossily decoded
/// text is not what the upstream sent, so it stays raw as well.
pub fn normalize_raw(raw: RawResponse) -> ResponseEnvelope {
    if raw.truncated || raw.lossy {
        return ResponseEnvelope {
            status: raw.status,
            body: EnvelopeBody::Raw(raw.body),
            headers: raw
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            duration_ms: raw.elapsed_ms,
            truncated: raw.truncated,
            lossy: raw.lossy,
        };
    }
    normalize(raw.status, &raw.body, raw.headers, raw.elapsed_ms)
}
