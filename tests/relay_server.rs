use consult_relay::relay::server::RelayServer;
use serde_json::{json, Value};

mod common;
use common::{quiet_logger, spy_harness, SpyRelay};

async fn exchange(server: &mut RelayServer, lines: &[Value]) -> Vec<Value> {
    let input: String = lines.iter().map(|line| format!("{}\n", line)).collect();
    let mut output: Vec<u8> = Vec::new();
    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve");
    String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[tokio::test]
async fn lists_endpoints_and_connections() {
    let mut server = RelayServer::new(quiet_logger(), spy_harness(SpyRelay::new(200, "{}")));
    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "endpoint_list"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "connection_list"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 2);
    let endpoints = responses[0]["result"].as_array().expect("endpoint array");
    assert_eq!(endpoints.len(), 9);
    let views = endpoints
        .iter()
        .find(|entry| entry["id"] == "views")
        .expect("views listed");
    assert_eq!(views["required"], json!(["caseId"]));
    assert_eq!(views["defaults"], json!({"source": "admin"}));
    assert_eq!(views["authScheme"], json!("bearer-header"));

    let connections = &responses[1]["result"];
    assert_eq!(connections[0]["websitePropertyId"], json!(42));
    assert!(!connections.to_string().contains("abc123"));
}

#[tokio::test]
async fn test_then_inspect_and_clear_session() {
    let spy = SpyRelay::new(200, r#"{"accepted":true}"#);
    let mut server = RelayServer::new(quiet_logger(), spy_harness(spy.clone()));
    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "session_last"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "endpoint_test",
                   "params": {"endpointId": "terms", "connectionIndex": 0}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "session_last"}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "session_clear"}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "session_clear"}),
        ],
    )
    .await;

    assert_eq!(responses[0]["result"], Value::Null);
    assert_eq!(responses[1]["result"]["status"], json!(200));
    assert_eq!(responses[1]["result"]["ok"], json!(true));
    assert_eq!(responses[1]["result"]["body"], json!({"accepted": true}));
    assert_eq!(responses[2]["result"]["endpoint_id"], json!("terms"));
    assert_eq!(
        responses[2]["result"]["states"],
        json!(["idle", "validating", "dispatching", "awaiting", "success", "idle"])
    );
    assert_eq!(responses[3]["result"]["cleared"], json!(true));
    assert_eq!(responses[4]["result"]["cleared"], json!(false));
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn harness_failures_are_results_not_rpc_errors() {
    let spy = SpyRelay::new(200, "{}");
    let mut server = RelayServer::new(quiet_logger(), spy_harness(spy.clone()));
    let responses = exchange(
        &mut server,
        &[json!({"jsonrpc": "2.0", "id": "a", "method": "endpoint_test",
                 "params": {"endpointId": "views", "rawParams": {"caseId": "0"}}})],
    )
    .await;

    let result = &responses[0]["result"];
    assert!(responses[0].get("error").is_none());
    assert_eq!(result["errorCode"], json!("INVALID_PARAMETER"));
    assert_eq!(result["ok"], json!(false));
    assert!(result.get("status").is_none());
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn delivered_error_status_is_not_ok() {
    let spy = SpyRelay::new(404, r#"{"error":"no such case"}"#);
    let mut server = RelayServer::new(quiet_logger(), spy_harness(spy.clone()));
    let responses = exchange(
        &mut server,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "endpoint_test",
                 "params": {"endpointId": "single-case-v2", "rawParams": {"caseId": "5"}}})],
    )
    .await;

    let result = &responses[0]["result"];
    assert_eq!(result["status"], json!(404));
    assert_eq!(result["ok"], json!(false));
    assert_eq!(result["body"], json!({"error": "no such case"}));
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn describe_redacts_credentials() {
    let mut server = RelayServer::new(quiet_logger(), spy_harness(SpyRelay::new(200, "{}")));
    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "endpoint_describe",
                   "params": {"endpointId": "cases"}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "endpoint_describe",
                   "params": {"endpointId": "terms"}}),
        ],
    )
    .await;

    let shown = responses.iter().map(Value::to_string).collect::<String>();
    assert!(!shown.contains("abc123"), "{shown}");
    assert!(shown.contains("[REDACTED]"));
    assert_eq!(responses[0]["result"]["method"], json!("GET"));
}

#[tokio::test]
async fn protocol_errors_and_notifications() {
    let spy = SpyRelay::new(200, "{}");
    let mut server = RelayServer::new(quiet_logger(), spy_harness(spy.clone()));

    let parse = server.handle_line("{not json").await.expect("parse error response");
    let parse = serde_json::to_value(parse).expect("serialize");
    assert_eq!(parse["error"]["code"], json!(-32700));

    let unknown = server
        .handle_line(r#"{"jsonrpc":"2.0","id":9,"method":"tools/list"}"#)
        .await
        .expect("response");
    let unknown = serde_json::to_value(unknown).expect("serialize");
    assert_eq!(unknown["error"]["code"], json!(-32601));

    let bad_params = server
        .handle_line(r#"{"jsonrpc":"2.0","id":10,"method":"endpoint_test","params":{"rawParams":{}}}"#)
        .await
        .expect("response");
    let bad_params = serde_json::to_value(bad_params).expect("serialize");
    assert_eq!(bad_params["error"]["code"], json!(-32602));

    let silent = server
        .handle_line(r#"{"jsonrpc":"2.0","method":"endpoint_test","params":{"endpointId":"status"}}"#)
        .await;
    assert!(silent.is_none());
    assert_eq!(spy.calls(), 1);
}
