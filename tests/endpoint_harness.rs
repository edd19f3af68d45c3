use consult_relay::errors::HarnessError;
use consult_relay::managers::harness::{InvocationRequest, InvocationState, TestSession};
use consult_relay::managers::registry::{self, ApiVersion, AuthScheme, HttpMethod};
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod common;
use common::{spy_harness, SpyRelay};

fn valid_value(name: &str) -> &'static str {
    match name {
        "from" | "to" => "2024-01-31",
        "status" | "source" => "open",
        _ => "7",
    }
}

#[test]
fn registry_auth_matches_api_version() {
    for descriptor in registry::all() {
        if descriptor.api_version == ApiVersion::V1 {
            assert_ne!(descriptor.auth_scheme, AuthScheme::Bearer, "{}", descriptor.id);
        }
        if descriptor.api_version == ApiVersion::V2 && descriptor.requires_identity {
            assert_eq!(descriptor.auth_scheme, AuthScheme::Bearer, "{}", descriptor.id);
        }
    }
    let mut ids = registry::known_ids();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[tokio::test]
async fn every_endpoint_composes_with_its_required_params() {
    let spy = SpyRelay::new(200, "{}");
    let harness = spy_harness(spy.clone());
    for descriptor in registry::all() {
        let mut request = InvocationRequest::new(descriptor.id.as_str());
        for name in descriptor.required_params() {
            request = request.param(name, valid_value(name));
        }
        let spec = harness.describe(&request).expect("all required present");
        assert_eq!(spec.method(), descriptor.method);
    }
    assert_eq!(spy.calls(), 0, "describe never dispatches");
}

#[tokio::test]
async fn omitting_a_required_param_fails_before_dispatch() {
    let spy = SpyRelay::new(200, "{}");
    let harness = spy_harness(spy.clone());
    for descriptor in registry::all() {
        let required: Vec<&str> = descriptor.required_params().collect();
        for omitted in &required {
            let mut request = InvocationRequest::new(descriptor.id.as_str());
            for name in required.iter().filter(|name| *name != omitted) {
                request = request.param(*name, valid_value(name));
            }
            let report = harness.test(&request).await;
            let err = report.outcome.error().expect("must fail");
            assert_eq!(err.error_code, "MISSING_PARAMETER");
            assert!(err.message.contains(omitted), "{}", err.message);
            assert_eq!(
                report.states,
                vec![
                    InvocationState::Idle,
                    InvocationState::Validating,
                    InvocationState::Error,
                    InvocationState::Idle,
                ]
            );
        }
    }
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn composing_is_deterministic() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let request = InvocationRequest::new("consultations")
        .param("caseId", "12")
        .param("from", "2024-01-01");
    let first = harness.describe(&request).expect("first");
    let second = harness.describe(&request).expect("second");
    assert_eq!(first, second);
}

#[tokio::test]
async fn terms_uses_bearer_header_only() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let spec = harness
        .describe(&InvocationRequest::new("terms").connection(0))
        .expect("terms");
    assert_eq!(spec.header("Authorization"), Some("Bearer abc123"));
    assert!(spec.body().is_none());
    assert!(!spec.url().contains("token="));
    assert!(spec.url().ends_with("/v2/terms?website_property_id=42"), "{}", spec.url());
}

#[tokio::test]
async fn single_case_without_case_id_is_missing_parameter() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let err = harness
        .describe(&InvocationRequest::new("single-case-v2"))
        .unwrap_err();
    assert_eq!(err, HarnessError::missing_parameter("caseId"));
}

#[tokio::test]
async fn views_rejects_zero_case_id() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let err = harness
        .describe(&InvocationRequest::new("views").param("caseId", "0"))
        .unwrap_err();
    assert_eq!(err, HarnessError::invalid_parameter("caseId", "must be positive"));

    let err = harness
        .describe(&InvocationRequest::new("views").param("caseId", "abc"))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETER");
}

#[tokio::test]
async fn views_fills_path_and_default_source() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let spec = harness
        .describe(&InvocationRequest::new("views").param("caseId", "15"))
        .expect("views");
    assert_eq!(spec.method(), HttpMethod::Post);
    assert_eq!(spec.url(), "https://api.example.com/v2/cases/15/views");
    assert_eq!(
        spec.body(),
        Some(&json!({"website_property_id": 42, "source": "admin"}))
    );
}

#[tokio::test]
async fn v1_get_carries_token_in_query() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let spec = harness
        .describe(&InvocationRequest::new("cases").param("perPage", "5"))
        .expect("cases");
    assert_eq!(
        spec.url(),
        "https://api.example.com/v1/cases?token=abc123&website_property_id=42&page=1&per_page=5"
    );
    assert!(spec.header("authorization").is_none());
}

#[tokio::test]
async fn v1_post_carries_token_in_body() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let spec = harness
        .describe(&InvocationRequest::new("consultations").param("to", "2024-02-29"))
        .expect("consultations");
    assert_eq!(spec.url(), "https://api.example.com/v1/consultations");
    assert_eq!(
        spec.body(),
        Some(&json!({"token": "abc123", "website_property_id": 42, "to": "2024-02-29"}))
    );
    assert!(spec.header("authorization").is_none());
}

#[tokio::test]
async fn unknown_endpoint_suggests_close_ids() {
    let harness = spy_harness(SpyRelay::new(200, "{}"));
    let err = harness
        .describe(&InvocationRequest::new("termz"))
        .unwrap_err();
    match err {
        HarnessError::UnknownEndpoint { suggestions, .. } => {
            assert!(suggestions.contains(&"terms".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connection_index_out_of_range_is_reported() {
    let spy = SpyRelay::new(200, "{}");
    let harness = spy_harness(spy.clone());
    let report = harness
        .test(&InvocationRequest::new("terms").connection(3))
        .await;
    let err = report.outcome.error().expect("out of range");
    assert_eq!(err.error_code, "CONNECTION_INDEX_OUT_OF_RANGE");
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn successful_run_walks_every_state_and_keeps_non_json_bodies() {
    let spy = SpyRelay::new(502, "<html>bad gateway</html>");
    let harness = spy_harness(spy.clone());
    let report = harness.test(&InvocationRequest::new("status")).await;
    assert_eq!(
        report.states,
        vec![
            InvocationState::Idle,
            InvocationState::Validating,
            InvocationState::Dispatching,
            InvocationState::Awaiting,
            InvocationState::Success,
            InvocationState::Idle,
        ]
    );
    let envelope = report.outcome.envelope().expect("envelope");
    assert_eq!(envelope.status, 502);
    assert!(!envelope.is_success());
    assert!(!report.outcome.is_ok());
    assert_eq!(report.outcome.to_result()["ok"], json!(false));
    assert_eq!(envelope.body.as_raw(), Some("<html>bad gateway</html>"));
    assert_eq!(
        envelope.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn session_keeps_only_the_latest_report() {
    let spy = SpyRelay::new(200, r#"{"ok":true}"#);
    let mut session = TestSession::new(spy_harness(spy.clone()));
    let cancel = CancellationToken::new();

    let first = session.run(&InvocationRequest::new("status"), &cancel).await.id;
    let second = session
        .run(&InvocationRequest::new("single-case-v2"), &cancel)
        .await
        .id;
    assert_ne!(first, second);
    let last = session.last().expect("last report");
    assert_eq!(last.endpoint_id, "single-case-v2");
    assert!(last.outcome.error().is_some());

    assert!(session.clear());
    assert!(session.last().is_none());
    assert!(!session.clear());
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn rpc_style_params_accept_numbers() {
    let spy = SpyRelay::new(200, "{}");
    let harness = spy_harness(spy.clone());
    let request: InvocationRequest = serde_json::from_value(json!({
        "endpointId": "single-case-v2",
        "rawParams": {"caseId": 9, "ignored": null},
        "connectionIndex": 0
    }))
    .expect("request");
    let report = harness.test(&request).await;
    assert!(report.outcome.envelope().is_some());
    assert_eq!(spy.seen()[0].url(), "https://api.example.com/v2/cases/9?website_property_id=42");
}
