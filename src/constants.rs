pub mod relay {
    pub const CLIENT_NAME: &str = "consult-relay";
    pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const ACCEPT_JSON: &str = "application/json";
    pub const HEADER_CLIENT: &str = "x-relay-client";
    pub const HEADER_VERSION: &str = "x-relay-version";
}

pub mod network {
    pub const TIMEOUT_RELAY_REQUEST_MS: u64 = 30_000;
    pub const MAX_REDIRECTS: usize = 5;
    pub const MAX_BODY_BYTES: usize = 1024 * 1024;
}

pub mod upstream {
    pub const DEFAULT_V1_BASE_URL: &str = "https://api.example.com/v1/";
    pub const DEFAULT_V2_BASE_URL: &str = "https://api.example.com/v2/";
}

pub mod params {
    pub const TOKEN: &str = "token";
    pub const WEBSITE_PROPERTY_ID: &str = "website_property_id";
    pub const DEFAULT_PAGE: &str = "1";
    pub const DEFAULT_PER_PAGE: &str = "20";
    pub const DEFAULT_VIEW_SOURCE: &str = "admin";
}

pub mod env {
    pub const TOKENS: &str = "CONSULT_RELAY_TOKENS";
    pub const PROPERTY_IDS: &str = "CONSULT_RELAY_PROPERTY_IDS";
    pub const TIMEOUT_MS: &str = "CONSULT_RELAY_TIMEOUT_MS";
    pub const DIAGNOSTICS: &str = "CONSULT_RELAY_DIAGNOSTICS";
    pub const INSECURE_TLS: &str = "CONSULT_RELAY_INSECURE_TLS";
    pub const V1_BASE_URL: &str = "CONSULT_RELAY_V1_BASE_URL";
    pub const V2_BASE_URL: &str = "CONSULT_RELAY_V2_BASE_URL";
    pub const MAX_BODY_BYTES: &str = "CONSULT_RELAY_MAX_BODY_BYTES";
    pub const LOG_LEVEL: &str = "CONSULT_RELAY_LOG_LEVEL";
}

pub mod redaction {
    pub const PLACEHOLDER: &str = "[REDACTED]";
    pub const TOKEN_PREVIEW_CHARS: usize = 4;
}
