// src/analytics/mod.rs
//! Usage reporting for completed exports.
//!
//! Reporting is a side channel: it never affects the outcome of a run, and
//! every failure ends in a warning.

use crate::config::PipelineConfig;
use crate::constants::USAGE_REPORT_TIMEOUT;
use crate::export::ExportSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Aggregate figures describing one run. Carries no content or credentials.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub tool: &'static str,
    pub version: &'static str,
    pub scope: &'static str,
    pub format: &'static str,
    pub duration_ms: u64,
    pub pages_exported: usize,
    pub pages_failed: usize,
    pub spaces_exported: usize,
    pub assets_downloaded: usize,
    pub preserve_hierarchy: bool,
    pub include_images: bool,
    pub include_attachments: bool,
    pub create_index: bool,
    pub finished_at: DateTime<Utc>,
}

impl UsageReport {
    pub fn new(config: &PipelineConfig, summary: &ExportSummary) -> Self {
        let export = &config.export;
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            scope: config.scope.name(),
            format: export.format.as_str(),
            duration_ms: summary.stats.elapsed.as_millis() as u64,
            pages_exported: summary.stats.pages_exported,
            pages_failed: summary.stats.pages_failed,
            spaces_exported: summary.spaces.len(),
            assets_downloaded: summary.stats.assets_downloaded,
            preserve_hierarchy: export.preserve_hierarchy,
            include_images: export.include_images,
            include_attachments: export.include_attachments,
            create_index: export.create_index,
            finished_at: Utc::now(),
        }
    }
}

/// Receives a usage record after a successful export.
#[async_trait::async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, usage: &UsageReport);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

#[async_trait::async_trait]
impl Reporter for NoopReporter {
    async fn report(&self, _usage: &UsageReport) {}
}

/// POSTs each report as JSON to a collection endpoint.
pub struct HttpUsageReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUsageReporter {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, crate::error::AppError> {
        let client = reqwest::Client::builder()
            .timeout(USAGE_REPORT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Reporter for HttpUsageReporter {
    async fn report(&self, usage: &UsageReport) {
        match self.client.post(&self.endpoint).json(usage).send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("Usage report accepted by {}", self.endpoint);
            }
            Ok(response) => {
                log::warn!(
                    "Usage report rejected by {}: HTTP {}",
                    self.endpoint,
                    response.status()
                );
            }
            Err(e) => log::warn!("Could not send usage report to {}: {}", self.endpoint, e),
        }
    }
}

/// The reporter configured for this run.
pub fn reporter_for(config: &PipelineConfig) -> Arc<dyn Reporter> {
    match &config.connection.metrics_url {
        Some(url) => match HttpUsageReporter::new(url.clone()) {
            Ok(reporter) => Arc::new(reporter),
            Err(e) => {
                log::warn!("Usage reporting disabled: {}", e);
                Arc::new(NoopReporter)
            }
        },
        None => Arc::new(NoopReporter),
    }
}

/// Sends the report on its own task. Awaiting the handle is optional.
pub fn spawn_report(reporter: Arc<dyn Reporter>, usage: UsageReport) -> JoinHandle<()> {
    tokio::spawn(async move { reporter.report(&usage).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn usage() -> UsageReport {
        UsageReport {
            tool: "wiki2md",
            version: "0.1.0",
            scope: "space",
            format: "markdown",
            duration_ms: 1200,
            pages_exported: 4,
            pages_failed: 0,
            spaces_exported: 1,
            assets_downloaded: 2,
            preserve_hierarchy: true,
            include_images: true,
            include_attachments: false,
            create_index: true,
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_http_reporter_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/usage"))
            .and(body_partial_json(serde_json::json!({
                "scope": "space",
                "pages_exported": 4
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = HttpUsageReporter::new(format!("{}/usage", server.uri())).unwrap();
        spawn_report(Arc::new(reporter), usage()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_report_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reporter = HttpUsageReporter::new(server.uri()).unwrap();
        reporter.report(&usage()).await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_swallowed() {
        let reporter = HttpUsageReporter::new("http://127.0.0.1:9/usage").unwrap();
        reporter.report(&usage()).await;
    }
}
