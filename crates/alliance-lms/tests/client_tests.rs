//! LMS client behavior against a mock server: cursor pagination, the
//! incremental filter, and the 404-tolerant mutations.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alliance_lms::LmsError;

#[tokio::test]
async fn test_follows_next_links_until_exhausted() {
    let server = MockServer::start().await;

    let page2_url = format!("{}/users?page=2", server.uri());
    let page3_url = format!("{}/users?page=3", server.uri());

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page[size]", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![user("u-1", "a@x.example"), user("u-2", "b@x.example")],
            Some(&page2_url),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![user("u-3", "c@x.example"), user("u-4", "d@x.example")],
            Some(&page3_url),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(vec![user("u-5", "e@x.example")], None)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let outcome = client.fetch_collection("users", None).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.records[0]["id"], "u-1");
    assert_eq!(outcome.records[4]["id"], "u-5");
}

#[tokio::test]
async fn test_later_page_failure_returns_partial_data() {
    let server = MockServer::start().await;

    let page2_url = format!("{}/users?page=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page[size]", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![user("u-1", "a@x.example"), user("u-2", "b@x.example")],
            Some(&page2_url),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let outcome = client.fetch_collection("users", None).await.unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.records.len(), 2);
    assert!(matches!(
        outcome.partial_error,
        Some(LmsError::Api { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_first_page_failure_fails_the_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let error = client.fetch_collection("users", None).await.unwrap_err();

    match error {
        LmsError::Api {
            status, message, ..
        } => {
            assert_eq!(status, 401);
            assert!(message.contains("authentication"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_incremental_filter_reaches_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param(
            "filter[updated_at][gteq]",
            "2025-03-14T09:26:53Z",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let since = chrono::DateTime::parse_from_rfc3339("2025-03-14T09:26:53Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let outcome = client.fetch_collection("users", Some(since)).await.unwrap();
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_get_one_maps_404() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/u-9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    let error = client.get_one("users/u-9").await.unwrap_err();
    assert!(error.is_not_found());
    // Expected churn does not count against health.
    assert!(client.is_healthy());
}

#[tokio::test]
async fn test_collection_404_does_not_poison_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/u-gone/enrollments"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    for _ in 0..5 {
        let error = client.fetch_user_enrollments("u-gone").await.unwrap_err();
        assert!(error.is_not_found());
    }
    // Churned users are a business outcome, not an outage signal.
    assert!(client.is_healthy());
}

#[tokio::test]
async fn test_remove_group_members_sends_person_ids() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/groups/g-1/relationships/people"))
        .and(body_partial_json(json!({
            "data": [
                {"type": "people", "id": "u-1"},
                {"type": "people", "id": "u-2"}
            ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    client
        .remove_group_members("g-1", &["u-1".to_string(), "u-2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remove_group_members_tolerates_404() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/groups/g-404/relationships/people"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    client
        .remove_group_members("g-404", &["u-1".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remove_group_members_empty_list_is_a_no_op() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would 404 and still pass, so assert
    // zero requests instead.
    let client = test_client(&server.uri(), 2);
    client.remove_group_members("g-1", &[]).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_group_tolerates_404_but_not_500() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/groups/g-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/groups/g-broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 2);
    client.delete_group("g-gone").await.unwrap();

    let error = client.delete_group("g-broken").await.unwrap_err();
    assert!(matches!(error, LmsError::Api { status: 500, .. }));
}
