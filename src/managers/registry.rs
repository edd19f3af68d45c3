use crate::constants::params::{DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_VIEW_SOURCE};
use crate::errors::HarnessError;
use crate::utils::suggest::suggest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthScheme {
    /// Token and property id travel with the payload (query for GET, JSON body for POST).
    #[serde(rename = "query-embedded-token")]
    QueryToken,
    #[serde(rename = "bearer-header")]
    Bearer,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositiveInteger,
    Date,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    /// Substituted into the path template.
    Path,
    /// Query string for GET, JSON body for POST.
    Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub wire_name: &'static str,
    pub kind: ParamKind,
    pub location: ParamLocation,
    pub required: bool,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    const fn payload(name: &'static str, wire_name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            wire_name,
            kind,
            location: ParamLocation::Payload,
            required: false,
            default: None,
        }
    }

    const fn path(name: &'static str, wire_name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            wire_name,
            kind,
            location: ParamLocation::Path,
            required: true,
            default: None,
        }
    }

    const fn defaulting(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointId {
    Status,
    Terms,
    Cases,
    Consultations,
    ValidateToken,
    CasesV2,
    SingleCaseV2,
    ConsultationsV2,
    Views,
}

impl EndpointId {
    pub const ALL: [EndpointId; 9] = [
        EndpointId::Status,
        EndpointId::Terms,
        EndpointId::Cases,
        EndpointId::Consultations,
        EndpointId::ValidateToken,
        EndpointId::CasesV2,
        EndpointId::SingleCaseV2,
        EndpointId::ConsultationsV2,
        EndpointId::Views,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointId::Status => "status",
            EndpointId::Terms => "terms",
            EndpointId::Cases => "cases",
            EndpointId::Consultations => "consultations",
            EndpointId::ValidateToken => "validate-token",
            EndpointId::CasesV2 => "cases-v2",
            EndpointId::SingleCaseV2 => "single-case-v2",
            EndpointId::ConsultationsV2 => "consultations-v2",
            EndpointId::Views => "views",
        }
    }

    pub fn descriptor(self) -> &'static EndpointDescriptor {
        match self {
            EndpointId::Status => &STATUS,
            EndpointId::Terms => &TERMS,
            EndpointId::Cases => &CASES,
            EndpointId::Consultations => &CONSULTATIONS,
            EndpointId::ValidateToken => &VALIDATE_TOKEN,
            EndpointId::CasesV2 => &CASES_V2,
            EndpointId::SingleCaseV2 => &SINGLE_CASE_V2,
            EndpointId::ConsultationsV2 => &CONSULTATIONS_V2,
            EndpointId::Views => &VIEWS,
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        EndpointId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| HarnessError::UnknownEndpoint {
                id: wanted.to_string(),
                suggestions: suggest(wanted, &known_ids(), 3),
            })
    }
}

/// Static description of one upstream operation. Path templates are
/// relative to the base URL of `api_version`.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub id: EndpointId,
    pub method: HttpMethod,
    pub path_template: &'static str,
    pub api_version: ApiVersion,
    pub auth_scheme: AuthScheme,
    pub requires_identity: bool,
    pub params: &'static [ParamSpec],
    pub summary: &'static str,
}

impl EndpointDescriptor {
    pub fn required_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }

    pub fn default_params(&self) -> BTreeMap<&'static str, &'static str> {
        self.params
            .iter()
            .filter_map(|p| p.default.map(|value| (p.name, value)))
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

const PAGINATION: &[ParamSpec] = &[
    ParamSpec::payload("page", "page", ParamKind::PositiveInteger).defaulting(DEFAULT_PAGE),
    ParamSpec::payload("perPage", "per_page", ParamKind::PositiveInteger)
        .defaulting(DEFAULT_PER_PAGE),
];

const CONSULTATION_FILTERS: &[ParamSpec] = &[
    ParamSpec::payload("caseId", "case_id", ParamKind::PositiveInteger),
    ParamSpec::payload("from", "from", ParamKind::Date),
    ParamSpec::payload("to", "to", ParamKind::Date),
];

static STATUS: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::Status,
    method: HttpMethod::Get,
    path_template: "status",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::None,
    requires_identity: false,
    params: &[],
    summary: "Upstream health check",
};

static TERMS: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::Terms,
    method: HttpMethod::Get,
    path_template: "terms",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::Bearer,
    requires_identity: true,
    params: &[],
    summary: "Terms accepted by the connected account",
};

static CASES: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::Cases,
    method: HttpMethod::Get,
    path_template: "cases",
    api_version: ApiVersion::V1,
    auth_scheme: AuthScheme::QueryToken,
    requires_identity: true,
    params: PAGINATION,
    summary: "Paged case list (v1)",
};

static CONSULTATIONS: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::Consultations,
    method: HttpMethod::Post,
    path_template: "consultations",
    api_version: ApiVersion::V1,
    auth_scheme: AuthScheme::QueryToken,
    requires_identity: true,
    params: CONSULTATION_FILTERS,
    summary: "Consultation search (v1)",
};

static VALIDATE_TOKEN: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::ValidateToken,
    method: HttpMethod::Post,
    path_template: "validate-token",
    api_version: ApiVersion::V1,
    auth_scheme: AuthScheme::QueryToken,
    requires_identity: true,
    params: &[],
    summary: "Checks that the token belongs to the property",
};

static CASES_V2: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::CasesV2,
    method: HttpMethod::Get,
    path_template: "cases",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::Bearer,
    requires_identity: true,
    params: &[
        ParamSpec::payload("page", "page", ParamKind::PositiveInteger).defaulting(DEFAULT_PAGE),
        ParamSpec::payload("perPage", "per_page", ParamKind::PositiveInteger)
            .defaulting(DEFAULT_PER_PAGE),
        ParamSpec::payload("status", "status", ParamKind::Text),
    ],
    summary: "Paged case list (v2)",
};

static SINGLE_CASE_V2: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::SingleCaseV2,
    method: HttpMethod::Get,
    path_template: "cases/{caseId}",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::Bearer,
    requires_identity: true,
    params: &[ParamSpec::path("caseId", "case_id", ParamKind::PositiveInteger)],
    summary: "One case by id",
};

static CONSULTATIONS_V2: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::ConsultationsV2,
    method: HttpMethod::Get,
    path_template: "consultations",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::Bearer,
    requires_identity: true,
    params: CONSULTATION_FILTERS,
    summary: "Consultation search (v2)",
};

static VIEWS: EndpointDescriptor = EndpointDescriptor {
    id: EndpointId::Views,
    method: HttpMethod::Post,
    path_template: "cases/{caseId}/views",
    api_version: ApiVersion::V2,
    auth_scheme: AuthScheme::Bearer,
    requires_identity: true,
    params: &[
        ParamSpec::path("caseId", "case_id", ParamKind::PositiveInteger),
        ParamSpec::payload("source", "source", ParamKind::Text).defaulting(DEFAULT_VIEW_SOURCE),
    ],
    summary: "Records a case view",
};

pub fn known_ids() -> Vec<&'static str> {
    EndpointId::ALL.iter().map(|id| id.as_str()).collect()
}

pub fn lookup(id: &str) -> Result<&'static EndpointDescriptor, HarnessError> {
    id.parse::<EndpointId>().map(EndpointId::descriptor)
}

pub fn all() -> impl Iterator<Item = &'static EndpointDescriptor> {
    EndpointId::ALL.into_iter().map(EndpointId::descriptor)
}
