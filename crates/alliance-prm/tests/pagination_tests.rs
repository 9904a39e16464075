//! Pagination behavior of the PRM client against a mock server.

mod common;

use common::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alliance_prm::PrmError;

const FIELDS: &[&str] = &["id", "name"];

#[tokio::test]
async fn test_walks_every_page() {
    let server = MockServer::start().await;

    // 5 records, page size 2: pages at skip 0, 2, 4.
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("skip", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(5, vec![account(1, "A"), account(2, "B")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("skip", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(5, vec![account(3, "C"), account(4, "D")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("skip", "4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(5, vec![account(5, "E")])),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let outcome = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.pages, 3);
    // Remote order is preserved.
    assert_eq!(outcome.records[0]["name"], "A");
    assert_eq!(outcome.records[4]["name"], "E");
}

#[tokio::test]
async fn test_single_short_page_ends_walk() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(1, vec![account(1, "Solo")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 10);
    let outcome = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.pages, 1);
}

#[tokio::test]
async fn test_first_page_failure_fails_the_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let error = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap_err();

    match error {
        PrmError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_later_page_failure_returns_partial_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("skip", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(4, vec![account(1, "A"), account(2, "B")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let outcome = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.records.len(), 2);
    assert!(matches!(
        outcome.partial_error,
        Some(PrmError::Api { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_envelope_failure_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "data": null
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let error = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, PrmError::Api { .. }));
}

#[tokio::test]
async fn test_non_json_body_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let error = client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap_err();

    match error {
        PrmError::Parse { snippet, .. } => assert!(snippet.contains("gateway")),
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_incremental_filter_reaches_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("filter", "Updated > '2025-03-14T09:26:53'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let since = chrono::DateTime::parse_from_rfc3339("2025-03-14T09:26:53Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let outcome = client
        .fetch_all("accounts", FIELDS, None, Some(since))
        .await
        .unwrap();
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_failures_trip_the_health_monitor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    assert!(client.is_healthy());

    // Threshold is 3 in the test config.
    for _ in 0..3 {
        let _ = client.fetch_all("accounts", FIELDS, None, None).await;
    }

    assert!(!client.is_healthy());
    assert!(client.ensure_healthy().is_err());
}

#[tokio::test]
async fn test_success_resets_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, vec![])))
        .mount(&server)
        .await;

    // Unmatched paths return 404, which drives the failure count up; the
    // real endpoint then succeeds and resets it.
    let client = test_client(&server.uri(), 2);
    for _ in 0..3 {
        let _ = client.fetch_all("missing", FIELDS, None, None).await;
    }
    assert!(!client.is_healthy());

    client
        .fetch_all("accounts", FIELDS, None, None)
        .await
        .unwrap();
    assert!(client.is_healthy());
}
