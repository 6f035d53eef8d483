//! Scenario: InfluxDB gateway over HTTP (mock server, no network).
//!
//! # Invariants under test
//!
//! 1. Latest-value and history queries bind the site code as a parameter and
//!    quote the field as an identifier.
//! 2. Basic auth is sent when credentials are configured.
//! 3. HTTP errors, statement errors and empty results map to the gateway
//!    error taxonomy.
//! 4. History rows that cannot be used are dropped, the rest is ascending.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use fw_influx::{InfluxEndpoint, InfluxGateway};
use fw_reconcile::{GatewayError, TimeSeriesGateway};
use httpmock::prelude::*;
use serde_json::json;

const FIELD: &str = "SEQ02.OLI.A.IC1";

fn gateway(server: &MockServer, with_auth: bool) -> InfluxGateway {
    InfluxGateway::new(InfluxEndpoint {
        base_url: server.base_url(),
        database: "signals".to_string(),
        measurement: "fastcharge".to_string(),
        site_tag: "project".to_string(),
        username: with_auth.then(|| "nw".to_string()),
        password: with_auth.then(|| "pw".to_string()),
        insecure_skip_verify: false,
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn latest_value_binds_site_and_sends_auth() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("db", "signals")
                .query_param(
                    "q",
                    "SELECT \"SEQ02.OLI.A.IC1\" FROM \"fastcharge\" WHERE \"project\" = $site ORDER BY time DESC LIMIT 1",
                )
                .query_param("params", r#"{"site":"7951-081"}"#)
                .header("Authorization", "Basic bnc6cHc=");
            then.status(200).json_body(json!({
                "results": [{"statement_id": 0, "series": [{
                    "name": "fastcharge",
                    "columns": ["time", FIELD],
                    "values": [["2025-03-01T10:00:00Z", 5]]
                }]}]
            }));
        })
        .await;

    let g = gateway(&server, true);
    let v = g.latest_value("7951-081", FIELD).await.unwrap();
    assert_eq!(v, 5.0);
    m.assert_async().await;
}

#[tokio::test]
async fn latest_value_empty_result_is_no_data() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/query");
            then.status(200)
                .json_body(json!({"results": [{"statement_id": 0}]}));
        })
        .await;

    let g = gateway(&server, false);
    let err = g.latest_value("7571", FIELD).await.unwrap_err();
    assert!(matches!(err, GatewayError::NoData));
}

#[tokio::test]
async fn http_error_is_query_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/query");
            then.status(401)
                .json_body(json!({"error": "authorization failed"}));
        })
        .await;

    let g = gateway(&server, false);
    let err = g.latest_value("7571", FIELD).await.unwrap_err();
    match err {
        GatewayError::QueryFailed(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("authorization failed"));
        }
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn statement_error_is_query_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/query");
            then.status(200).json_body(json!({
                "results": [{"statement_id": 0, "error": "database not found: signals"}]
            }));
        })
        .await;

    let g = gateway(&server, false);
    let since = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    let err = g.history("7571", FIELD, since).await.unwrap_err();
    assert!(matches!(err, GatewayError::QueryFailed(_)));
}

#[tokio::test]
async fn history_binds_lower_bound_and_drops_bad_rows() {
    let server = MockServer::start_async().await;
    let since = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param(
                    "q",
                    "SELECT \"SEQ02.OLI.A.IC1\" FROM \"fastcharge\" WHERE \"project\" = $site AND time >= $since ORDER BY time ASC",
                )
                .query_param_exists("params");
            then.status(200).json_body(json!({
                "results": [{"statement_id": 0, "series": [{
                    "name": "fastcharge",
                    "columns": ["time", FIELD],
                    "values": [
                        ["2025-02-10T08:00:00Z", 0],
                        ["garbage", 1],
                        ["2025-02-11T08:00:00Z", null],
                        ["2025-02-12T08:00:00Z", 1.0],
                        ["2025-02-13T08:00:00Z", 1]
                    ]
                }]}]
            }));
        })
        .await;

    let g = gateway(&server, false);
    let samples = g.history("7571", FIELD, since).await.unwrap();
    m.assert_async().await;

    assert_eq!(samples.len(), 3);
    assert_eq!(
        samples[1].ts,
        Utc.with_ymd_and_hms(2025, 2, 12, 8, 0, 0).unwrap()
    );
    assert!(samples.windows(2).all(|w| w[0].ts <= w[1].ts));
}

#[tokio::test]
async fn ping_succeeds_on_204_and_fails_otherwise() {
    let server = MockServer::start_async().await;
    let mut ok = server
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(204);
        })
        .await;

    let g = gateway(&server, false);
    g.ping().await.unwrap();

    ok.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(503);
        })
        .await;
    assert!(g.ping().await.is_err());
}
