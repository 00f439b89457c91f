//! Getting report payloads from the reporting API (or a saved file).

use crate::config::ApiConfig;
use crate::error::{ReportError, ReportResult};
use crate::loader::{normalize, LoadReport};
use crate::types::{ReportPeriod, ReportRoot};
use crate::util::format_iso_date;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};

/// What to ask a report endpoint for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub endpoint: String,
    pub period: ReportPeriod,
    /// Company variant selector some endpoints accept.
    pub company: Option<String>,
}

impl ReportQuery {
    pub fn new(endpoint: impl Into<String>, period: ReportPeriod) -> Self {
        ReportQuery {
            endpoint: endpoint.into(),
            period,
            company: None,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("startDate", format_iso_date(self.period.start)),
            ("endDate", format_iso_date(self.period.end)),
        ];
        if let Some(c) = &self.company {
            params.push(("company", c.clone()));
        }
        params
    }
}

/// Anything that can hand back a raw report payload.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_raw(&self, query: &ReportQuery) -> ReportResult<Value>;
}

/// Fetch and normalize in one step. The requested period is used when the
/// payload does not state its own.
pub async fn fetch_report(
    source: &dyn ReportSource,
    query: &ReportQuery,
) -> ReportResult<(ReportRoot, LoadReport)> {
    let raw = source.fetch_raw(query).await?;
    normalize(raw, Some(query.period))
}

/// HTTP client for the reporting API.
pub struct HttpReportSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpReportSource {
    pub fn new(config: &ApiConfig) -> ReportResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(HttpReportSource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
        })
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn fetch_once(&self, query: &ReportQuery) -> ReportResult<Value> {
        let url = self.url_for(&query.endpoint);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&query.query_params());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        let body = response.text().await?;
        debug!(url = %url, bytes = body.len(), "report response received");
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ReportSource for HttpReportSource {
    async fn fetch_raw(&self, query: &ReportQuery) -> ReportResult<Value> {
        with_retry(self.max_attempts, self.backoff, &query.endpoint, || self.fetch_once(query)).await
    }
}

/// Run `attempt_fn` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` tries have been made. Sleeps `backoff_delay` between tries.
pub async fn with_retry<T, F, Fut>(
    max_attempts: u32,
    backoff: Duration,
    endpoint: &str,
    mut attempt_fn: F,
) -> ReportResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReportResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(backoff, attempt);
                warn!(attempt, ?delay, "report fetch failed, retrying: {}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(endpoint = %endpoint, attempt, "report fetch failed: {}", e);
                return Err(e);
            }
        }
    }
}

/// `base * 2^(attempt - 1)`, capped so the shift cannot overflow.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Reads a payload saved to disk; the query is ignored.
pub struct FileReportSource {
    path: PathBuf,
}

impl FileReportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileReportSource { path: path.into() }
    }
}

#[async_trait]
impl ReportSource for FileReportSource {
    async fn fetch_raw(&self, _query: &ReportQuery) -> ReportResult<Value> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&text)?)
    }
}
