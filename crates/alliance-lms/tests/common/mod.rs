//! Common test utilities for alliance-lms integration tests.

use std::time::Duration;

use serde_json::{json, Value};

use alliance_lms::{LmsClient, LmsClientConfig};

/// Builds a client pointed at a mock server, with no inter-page delay.
pub fn test_client(base_url: &str, page_size: u32) -> LmsClient {
    LmsClient::new(LmsClientConfig {
        base_url: base_url.to_string(),
        api_token: "test-token".to_string(),
        page_size,
        page_delay: Duration::from_millis(0),
        max_pages: 50,
        timeout: Duration::from_secs(5),
        failure_threshold: 3,
    })
    .expect("client builds")
}

/// Test data factory for an LMS user row.
pub fn user(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "name": format!("User {id}"),
        "status": "active"
    })
}

/// Wraps rows in a page body, with an optional next link.
pub fn page(data: Vec<Value>, next: Option<&str>) -> Value {
    match next {
        Some(next) => json!({ "data": data, "links": { "next": next } }),
        None => json!({ "data": data, "links": {} }),
    }
}
