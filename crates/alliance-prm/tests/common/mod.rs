//! Common test utilities for alliance-prm integration tests.

use std::time::Duration;

use serde_json::{json, Value};

use alliance_prm::{PrmClient, PrmClientConfig};

/// Builds a client pointed at a mock server, with no inter-page delay.
pub fn test_client(base_url: &str, page_size: u32) -> PrmClient {
    PrmClient::new(PrmClientConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        page_size,
        page_delay: Duration::from_millis(0),
        max_pages: 50,
        timeout: Duration::from_secs(5),
        failure_threshold: 3,
    })
    .expect("client builds")
}

/// Test data factory for a PRM account row.
pub fn account(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "tier": "Premier",
        "status": "Active",
        "region": "AMER",
        "crmAccountId": format!("001A00000{:06}", id)
    })
}

/// Wraps rows in the PRM response envelope.
pub fn envelope(count: u64, results: Vec<Value>) -> Value {
    json!({
        "success": true,
        "data": { "count": count, "results": results }
    })
}
