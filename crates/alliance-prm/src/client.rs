//! PRM HTTP client with skip/take pagination and health tracking.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use alliance_core::{HealthMonitor, HealthSnapshot, SyncSettings};

use crate::error::{body_snippet, status_message, PrmError, PrmResult};

/// Connection settings for the PRM client.
#[derive(Debug, Clone)]
pub struct PrmClientConfig {
    /// API root, e.g. `https://prm.example.com/api/objects/v1`.
    pub base_url: String,
    /// Bearer token for the integration user.
    pub api_key: String,
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

impl PrmClientConfig {
    /// Builds a config from the shared sync settings.
    #[must_use]
    pub fn from_settings(base_url: String, api_key: String, settings: &SyncSettings) -> Self {
        Self {
            base_url,
            api_key,
            page_size: settings.prm_page_size,
            page_delay: Duration::from_millis(settings.page_delay_ms),
            max_pages: settings.max_pages,
            timeout: Duration::from_secs(settings.http_timeout_secs),
            failure_threshold: settings.failure_threshold,
        }
    }
}

/// Response envelope for PRM collection reads.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    count: u64,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

/// Result of walking a paginated collection.
///
/// A failure on any page after the first attaches the error here instead of
/// discarding the pages already fetched; the caller decides whether partial
/// data is usable.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Accumulated records, in remote order.
    pub records: Vec<serde_json::Value>,
    /// Pages fetched successfully.
    pub pages: u32,
    /// Error that stopped the walk early, if any.
    pub partial_error: Option<PrmError>,
}

impl FetchOutcome {
    /// Whether the walk covered the whole collection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.partial_error.is_none()
    }
}

/// PRM API client.
#[derive(Debug)]
pub struct PrmClient {
    http: reqwest::Client,
    config: PrmClientConfig,
    health: Mutex<HealthMonitor>,
}

impl PrmClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `PrmError::Config` if the HTTP client cannot be built.
    pub fn new(config: PrmClientConfig) -> PrmResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PrmError::Config(format!("Failed to create HTTP client: {e}")))?;

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

    /// Fails fast when the health monitor has tripped. Called by the engine
    /// before starting a sync run; individual requests are still allowed so
    /// a recovered upstream can reset the count.
    pub fn ensure_healthy(&self) -> PrmResult<()> {
        let snapshot = self.health();
        if snapshot.healthy {
            Ok(())
        } else {
            Err(PrmError::Unhealthy {
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

    /// Builds the PRM filter expression for an incremental fetch, combining
    /// the update cursor with any base filter.
    #[must_use]
    pub fn build_filter(base: Option<&str>, since: Option<DateTime<Utc>>) -> Option<String> {
        // The PRM expects ISO-8601 without a zone suffix.
        let cursor = since.map(|at| format!("Updated > '{}'", at.format("%Y-%m-%dT%H:%M:%S")));
        match (base, cursor) {
            (Some(base), Some(cursor)) => Some(format!("{base} and {cursor}")),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(cursor)) => Some(cursor),
            (None, None) => None,
        }
    }

    /// Walks a collection page by page.
    ///
    /// The first page failing fails the whole call. A later page failing
    /// returns the records accumulated so far with the error attached.
    #[instrument(skip(self, fields), fields(object_type = object_type))]
    pub async fn fetch_all(
        &self,
        object_type: &str,
        fields: &[&str],
        base_filter: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> PrmResult<FetchOutcome> {
        let endpoint = format!("{}/{}", self.config.base_url, object_type);
        let filter = Self::build_filter(base_filter, since);
        let fields = fields.join(",");
        let take = self.config.page_size;

        let mut records: Vec<serde_json::Value> = Vec::new();
        let mut skip: u64 = 0;
        let mut pages: u32 = 0;

        loop {
            debug!(skip, take, "Fetching PRM page");
            let page = match self.fetch_page(&endpoint, &fields, filter.as_deref(), skip).await {
                Ok(page) => page,
                Err(e) => {
                    self.record_failure();
                    if pages == 0 {
                        return Err(e);
                    }
                    warn!(
                        pages,
                        accumulated = records.len(),
                        error = %e,
                        "PRM page fetch failed, returning partial data"
                    );
                    return Ok(FetchOutcome {
                        records,
                        pages,
                        partial_error: Some(e),
                    });
                }
            };

            self.record_success();
            pages += 1;

            let fetched = page.results.len() as u64;
            records.extend(page.results);

            let exhausted = fetched < u64::from(take) || skip + fetched >= page.count;
            if exhausted {
                break;
            }
            if pages >= self.config.max_pages {
                // Safety valve, not an expected stop: a healthy remote ends
                // the walk by returning a short page first.
                warn!(
                    pages,
                    max_pages = self.config.max_pages,
                    "PRM page ceiling reached, stopping fetch"
                );
                break;
            }

            skip += fetched;
            tokio::time::sleep(self.config.page_delay).await;
        }

        debug!(total = records.len(), pages, "PRM fetch complete");
        Ok(FetchOutcome {
            records,
            pages,
            partial_error: None,
        })
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        fields: &str,
        filter: Option<&str>,
        skip: u64,
    ) -> PrmResult<EnvelopeData> {
        let mut request = self
            .http
            .get(endpoint)
            .bearer_auth(&self.config.api_key)
            .query(&[("fields", fields)])
            .query(&[("skip", skip), ("take", u64::from(self.config.page_size))]);

        if let Some(filter) = filter {
            request = request.query(&[("filter", filter)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrmError::api(status.as_u16(), endpoint));
        }

        let body = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&body).map_err(|_| PrmError::Parse {
            endpoint: endpoint.to_string(),
            snippet: body_snippet(&body),
        })?;

        if !envelope.success {
            return Err(PrmError::Api {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                message: format!(
                    "envelope reported failure: {}",
                    status_message(status.as_u16())
                ),
            });
        }

        envelope.data.ok_or_else(|| PrmError::Parse {
            endpoint: endpoint.to_string(),
            snippet: body_snippet(&body),
        })
    }
}
