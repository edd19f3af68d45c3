use crate::constants::{env, network, upstream};
use crate::errors::HarnessError;
use crate::managers::composer::ApiBase;
use crate::managers::relay::RelaySettings;
use crate::managers::resolver::ConnectionCredential;
use crate::utils::feature_flags::flag_from;

/// Everything the harness reads from its host: upstream accounts, base URLs
/// and relay policy. Loaded once; never written back.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub connections: Vec<ConnectionCredential>,
    pub api_base: ApiBase,
    pub timeout_ms: u64,
    pub relay: RelaySettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            api_base: ApiBase::default(),
            timeout_ms: network::TIMEOUT_RELAY_REQUEST_MS,
            relay: RelaySettings::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Unset keys take
    /// their defaults; malformed values are errors rather than defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tokens = split_list(lookup(env::TOKENS));
        let property_ids = split_list(lookup(env::PROPERTY_IDS));
        let connections = ConnectionCredential::pair(tokens.as_slice(), property_ids.as_slice())?;

        let v1 = lookup(env::V1_BASE_URL).unwrap_or_else(|| upstream::DEFAULT_V1_BASE_URL.to_string());
        let v2 = lookup(env::V2_BASE_URL).unwrap_or_else(|| upstream::DEFAULT_V2_BASE_URL.to_string());
        let api_base = ApiBase::new(&v1, &v2)?;

        let timeout_ms = read_positive(&lookup, env::TIMEOUT_MS)?
            .unwrap_or(network::TIMEOUT_RELAY_REQUEST_MS);
        let max_body_bytes = read_positive(&lookup, env::MAX_BODY_BYTES)?
            .map(|value| value as usize)
            .unwrap_or(network::MAX_BODY_BYTES);

        Ok(Self {
            connections,
            api_base,
            timeout_ms,
            relay: RelaySettings {
                verify_tls: !flag_from(&lookup, env::INSECURE_TLS, false),
                diagnostics: flag_from(&lookup, env::DIAGNOSTICS, false),
                max_body_bytes,
            },
        })
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(text) if !text.trim().is_empty() => {
            text.split(',').map(|item| item.trim().to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn read_positive<F>(lookup: &F, key: &str) -> Result<Option<u64>, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .map(Some)
        .ok_or_else(|| {
            HarnessError::invalid_configuration(format!("{} must be a positive integer", key))
        })
}
