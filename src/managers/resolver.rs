use crate::errors::HarnessError;
use crate::utils::redact::token_preview;
use serde::Serialize;
use std::fmt;

/// One upstream account: an opaque token paired with the tenant it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionCredential {
    token: String,
    website_property_id: u64,
}

impl ConnectionCredential {
    pub fn new(token: impl Into<String>, website_property_id: u64) -> Result<Self, HarnessError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(HarnessError::invalid_configuration("token must not be empty"));
        }
        if token.trim().chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(HarnessError::invalid_configuration(
                "token must not contain whitespace or control characters",
            ));
        }
        if website_property_id == 0 {
            return Err(HarnessError::invalid_configuration(
                "website property id must be positive",
            ));
        }
        Ok(Self {
            token: token.trim().to_string(),
            website_property_id,
        })
    }

    /// Pairs tokens with property ids by position. A length mismatch is a
    /// configuration error; no entry is ever paired with a neighbour's id.
    pub fn pair<T, P>(tokens: &[T], property_ids: &[P]) -> Result<Vec<Self>, HarnessError>
    where
        T: AsRef<str>,
        P: AsRef<str>,
    {
        if tokens.len() != property_ids.len() {
            return Err(HarnessError::invalid_configuration(format!(
                "{} token(s) but {} website property id(s) configured",
                tokens.len(),
                property_ids.len()
            )));
        }
        tokens
            .iter()
            .zip(property_ids)
            .enumerate()
            .map(|(index, (token, raw_id))| {
                let raw_id = raw_id.as_ref().trim();
                let id = raw_id
                    .parse::<u64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| {
                        HarnessError::invalid_configuration(format!(
                            "connection {}: website property id {:?} is not a positive integer",
                            index, raw_id
                        ))
                    })?;
                Self::new(token.as_ref(), id).map_err(|err| match err {
                    HarnessError::InvalidConfiguration(message) => {
                        HarnessError::invalid_configuration(format!(
                            "connection {}: {}",
                            index, message
                        ))
                    }
                    other => other,
                })
            })
            .collect()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn website_property_id(&self) -> u64 {
        self.website_property_id
    }

    pub fn summary(&self, index: usize) -> ConnectionSummary {
        ConnectionSummary {
            index,
            website_property_id: self.website_property_id,
            token_preview: token_preview(&self.token),
        }
    }
}

impl fmt::Debug for ConnectionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCredential")
            .field("token", &token_preview(&self.token))
            .field("website_property_id", &self.website_property_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub index: usize,
    pub website_property_id: u64,
    pub token_preview: String,
}

pub fn resolve(
    connections: &[ConnectionCredential],
    index: usize,
) -> Result<&ConnectionCredential, HarnessError> {
    if connections.is_empty() {
        return Err(HarnessError::NoConfiguredConnection);
    }
    connections
        .get(index)
        .ok_or(HarnessError::ConnectionIndexOutOfRange {
            index,
            available: connections.len(),
        })
}
