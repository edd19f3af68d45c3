use crate::constants::redaction::{PLACEHOLDER, TOKEN_PREVIEW_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
];

static INLINE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(Bearer)\s+[A-Za-z0-9._~+/=-]+").expect("bearer redaction regex"),
            "$1 [REDACTED]",
        ),
        (
            Regex::new(r"([?&]token=)[^&#\s]+").expect("query token redaction regex"),
            "${1}[REDACTED]",
        ),
        (
            Regex::new(r#"("token"\s*:\s*)"[^"]*""#).expect("json token redaction regex"),
            "$1\"[REDACTED]\"",
        ),
    ]
});

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    SENSITIVE_HEADERS.contains(&normalized.as_str())
        || normalized == "token"
        || normalized.ends_with("_token")
        || normalized.contains("secret")
        || normalized.contains("password")
}

/// Shows only the first few characters of a secret, enough to tell two
/// configured connections apart.
pub fn token_preview(token: &str) -> String {
    let visible: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
    if token.chars().count() <= TOKEN_PREVIEW_CHARS * 2 {
        return "****".to_string();
    }
    format!("{}****", visible)
}

fn cap(value: String, max_len: usize) -> String {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}

/// Scrubs bearer tokens, `token=` query pairs and `"token"` JSON members out
/// of free text, plus any literal value listed in `secrets`.
pub fn redact_text(value: &str, max_len: usize, secrets: &[&str]) -> String {
    let mut out = value.to_string();
    for (pattern, replacement) in INLINE_PATTERNS.iter() {
        if pattern.is_match(&out) {
            out = pattern.replace_all(&out, *replacement).into_owned();
        }
    }
    for secret in secrets {
        let needle = secret.trim();
        if needle.len() >= 4 {
            out = out.replace(needle, PLACEHOLDER);
        }
    }
    cap(out, max_len)
}

pub fn redact_object(value: &Value, max_len: usize, secrets: &[&str]) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text, max_len, secrets)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_object(item, max_len, secrets))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map {
                if is_sensitive_key(key) && !entry.is_null() {
                    out.insert(key.clone(), Value::String(PLACEHOLDER.to_string()));
                } else {
                    out.insert(key.clone(), redact_object(entry, max_len, secrets));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
