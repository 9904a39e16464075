//! LMS HTTP client with `links.next` cursor pagination.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use alliance_core::{HealthMonitor, HealthSnapshot, SyncSettings};

use crate::error::{body_snippet, LmsError, LmsResult};

/// Connection settings for the LMS client.
#[derive(Debug, Clone)]
pub struct LmsClientConfig {
    /// API root, e.g. `https://lms.example.com/api/v2`.
    pub base_url: String,
    /// Bearer token for the integration user.
    pub api_token: String,
    /// Records per page.
    pub page_size: u32,
    /// Mandatory sleep between pages.
    pub page_delay: Duration,
    /// Hard ceiling on pages per fetch.
    pub max_pages: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Consecutive failures before the client reports unhealthy.
    pub failure_threshold: u32,
}

impl LmsClientConfig {
    /// Builds a config from the shared sync settings.
    #[must_use]
    pub fn from_settings(base_url: String, api_token: String, settings: &SyncSettings) -> Self {
        Self {
            base_url,
            api_token,
            page_size: settings.lms_page_size,
            page_delay: Duration::from_millis(settings.page_delay_ms),
            max_pages: settings.max_pages,
            timeout: Duration::from_secs(settings.http_timeout_secs),
            failure_threshold: settings.failure_threshold,
        }
    }
}

/// One page of an LMS collection response.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

/// Result of walking a paginated LMS collection.
///
/// Mirrors the PRM contract: a failure after the first page returns the
/// records accumulated so far with the error attached.
#[derive(Debug)]
pub struct LmsFetchOutcome {
    /// Accumulated records, in remote order.
    pub records: Vec<serde_json::Value>,
    /// Pages fetched successfully.
    pub pages: u32,
    /// Error that stopped the walk early, if any.
    pub partial_error: Option<LmsError>,
}

impl LmsFetchOutcome {
    /// Whether the walk covered the whole collection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.partial_error.is_none()
    }
}

/// LMS API client.
#[derive(Debug)]
pub struct LmsClient {
    http: reqwest::Client,
    config: LmsClientConfig,
    health: Mutex<HealthMonitor>,
}

impl LmsClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `LmsError::Config` if the HTTP client cannot be built.
    pub fn new(config: LmsClientConfig) -> LmsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LmsError::Config(format!("Failed to create HTTP client: {e}")))?;

        let health = Mutex::new(HealthMonitor::new(config.failure_threshold));
        Ok(Self {
            http,
            config,
            health,
        })
    }

    /// Whether the consecutive-failure count is below the threshold.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health.lock().map(|h| h.is_healthy()).unwrap_or(true)
    }

    /// Current health state.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.health
            .lock()
            .map(|h| h.snapshot())
            .unwrap_or_else(|_| HealthMonitor::new(self.config.failure_threshold).snapshot())
    }

    /// Fails fast when the health monitor has tripped.
    pub fn ensure_healthy(&self) -> LmsResult<()> {
        let snapshot = self.health();
        if snapshot.healthy {
            Ok(())
        } else {
            Err(LmsError::Unhealthy {
                consecutive_failures: snapshot.consecutive_failures,
            })
        }
    }

    fn record_success(&self) {
        if let Ok(mut health) = self.health.lock() {
            health.record_success();
        }
    }

    fn record_failure(&self) {
        if let Ok(mut health) = self.health.lock() {
            health.record_failure();
        }
    }

    fn collection_url(&self, path: &str, since: Option<DateTime<Utc>>) -> String {
        let mut url = format!(
            "{}/{}?page[size]={}",
            self.config.base_url, path, self.config.page_size
        );
        if let Some(since) = since {
            url.push_str(&format!(
                "&filter[updated_at][gteq]={}",
                since.format("%Y-%m-%dT%H:%M:%SZ")
            ));
        }
        url
    }

    /// Walks a collection by following `links.next` until exhausted.
    ///
    /// The first page failing fails the whole call; a later page failing
    /// returns accumulated records with the error attached.
    #[instrument(skip(self), fields(path = path))]
    pub async fn fetch_collection(
        &self,
        path: &str,
        since: Option<DateTime<Utc>>,
    ) -> LmsResult<LmsFetchOutcome> {
        let mut url = self.collection_url(path, since);
        let mut records: Vec<serde_json::Value> = Vec::new();
        let mut pages: u32 = 0;

        loop {
            debug!(%url, "Fetching LMS page");
            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    // Expected-churn 404s (deleted users, removed groups)
                    // are business outcomes and don't count against health.
                    if !e.is_not_found() {
                        self.record_failure();
                    }
                    if pages == 0 {
                        return Err(e);
                    }
                    warn!(
                        pages,
                        accumulated = records.len(),
                        error = %e,
                        "LMS page fetch failed, returning partial data"
                    );
                    return Ok(LmsFetchOutcome {
                        records,
                        pages,
                        partial_error: Some(e),
                    });
                }
            };

            self.record_success();
            pages += 1;
            records.extend(page.data);

            match page.links.next {
                Some(next) if pages < self.config.max_pages => {
                    url = next;
                    tokio::time::sleep(self.config.page_delay).await;
                }
                Some(_) => {
                    warn!(
                        pages,
                        max_pages = self.config.max_pages,
                        "LMS page ceiling reached, stopping fetch"
                    );
                    break;
                }
                None => break,
            }
        }

        debug!(total = records.len(), pages, "LMS fetch complete");
        Ok(LmsFetchOutcome {
            records,
            pages,
            partial_error: None,
        })
    }

    /// Fetches a single resource. A 404 surfaces as `LmsError::Api` with
    /// `is_not_found()` true; callers in churn-tolerant flows branch on it.
    #[instrument(skip(self), fields(path = path))]
    pub async fn get_one(&self, path: &str) -> LmsResult<serde_json::Value> {
        let url = format!("{}/{}", self.config.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .inspect_err(|_| self.record_failure())?;

        let status = response.status();
        if !status.is_success() {
            // Expected-churn 404s don't count against health.
            if status.as_u16() != 404 {
                self.record_failure();
            }
            return Err(LmsError::api(status.as_u16(), &url));
        }

        self.record_success();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| LmsError::Parse {
            endpoint: url,
            snippet: body_snippet(&body),
        })
    }

    /// All enrollment transcripts of one user, paginated.
    pub async fn fetch_user_enrollments(&self, user_id: &str) -> LmsResult<LmsFetchOutcome> {
        self.fetch_collection(&format!("users/{user_id}/enrollments"), None)
            .await
    }

    /// Removes people from a group's membership.
    ///
    /// A 404 means the group (or membership) is already gone and is treated
    /// as success.
    #[instrument(skip(self, person_ids), fields(group_id = group_id, count = person_ids.len()))]
    pub async fn remove_group_members(
        &self,
        group_id: &str,
        person_ids: &[String],
    ) -> LmsResult<()> {
        if person_ids.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/groups/{}/relationships/people",
            self.config.base_url, group_id
        );
        let payload = json!({
            "data": person_ids
                .iter()
                .map(|id| json!({"type": "people", "id": id}))
                .collect::<Vec<_>>()
        });

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await
            .inspect_err(|_| self.record_failure())?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            self.record_success();
            return Ok(());
        }

        self.record_failure();
        Err(LmsError::api(status.as_u16(), &url))
    }

    /// Deletes a group. A 404 means it is already gone and is treated as
    /// success.
    #[instrument(skip(self), fields(group_id = group_id))]
    pub async fn delete_group(&self, group_id: &str) -> LmsResult<()> {
        let url = format!("{}/groups/{}", self.config.base_url, group_id);
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .inspect_err(|_| self.record_failure())?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            self.record_success();
            return Ok(());
        }

        self.record_failure();
        Err(LmsError::api(status.as_u16(), &url))
    }

    async fn fetch_page(&self, url: &str) -> LmsResult<Page> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LmsError::api(status.as_u16(), url));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| LmsError::Parse {
            endpoint: url.to_string(),
            snippet: body_snippet(&body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> LmsClientConfig {
        LmsClientConfig {
            base_url: "https://lms.example.com/api/v2".to_string(),
            api_token: "token".to_string(),
            page_size: 100,
            page_delay: Duration::from_millis(0),
            max_pages: 500,
            timeout: Duration::from_secs(30),
            failure_threshold: 5,
        }
    }

    #[test]
    fn test_collection_url_without_cursor() {
        let client = LmsClient::new(config()).unwrap();
        assert_eq!(
            client.collection_url("users", None),
            "https://lms.example.com/api/v2/users?page[size]=100"
        );
    }

    #[test]
    fn test_collection_url_with_cursor() {
        let client = LmsClient::new(config()).unwrap();
        let since = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            client.collection_url("users", Some(since)),
            "https://lms.example.com/api/v2/users?page[size]=100&filter[updated_at][gteq]=2025-03-14T09:26:53Z"
        );
    }

    #[test]
    fn test_page_parses_links() {
        let body = r#"{"data": [{"id": "1"}], "links": {"next": "https://x/page2"}}"#;
        let page: Page = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.links.next.as_deref(), Some("https://x/page2"));

        let last = r#"{"data": []}"#;
        let page: Page = serde_json::from_str(last).unwrap();
        assert!(page.links.next.is_none());
    }
}
