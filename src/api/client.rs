// src/api/client.rs
//! HTTP client for the wiki REST API.
//!
//! Handles authentication, URL resolution, retries, the circuit breaker and
//! cancellation. "Not found" responses surface as `Ok(None)` so callers can
//! tell a missing resource from a failing backend.

use super::circuit_breaker::CircuitBreaker;
use super::pagination::{fetch_all_pages, PageCursor, PaginationStrategy};
use super::responses::{ContentResponse, ContentStub, ListingResponse, SpaceResponse, ToDomain};
use super::WikiRepository;
use crate::config::{ConnectionSettings, ExportConfig};
use crate::constants::{
    ERROR_BODY_PREVIEW_LENGTH, HTTP_REQUEST_TIMEOUT, PAGE_EXPANSIONS, WIKI_API_PAGE_SIZE,
};
use crate::error::{ApiErrorCode, AppError};
use crate::error_recovery::{retry_with_backoff, RetryPolicy};
use crate::model::{Page, Space};
use crate::output::paths::encode_path_segment;
use crate::types::{BaseUrl, Credentials, PageId, SpaceKey};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Authenticated client for one wiki tenant.
#[derive(Clone)]
pub struct ConfluenceHttpClient {
    client: Client,
    wiki_root: String,
    origin: String,
    auth_header: header::HeaderValue,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    request_delay: Duration,
    page_size: u32,
    cancel: CancellationToken,
}

impl ConfluenceHttpClient {
    /// Creates a client for the tenant at `base_url`.
    pub fn new(base_url: &BaseUrl, credentials: &Credentials) -> Result<Self, AppError> {
        let client = Client::builder().timeout(HTTP_REQUEST_TIMEOUT).build()?;

        let mut auth_header = header::HeaderValue::from_str(&credentials.basic_auth_header())
            .map_err(|e| {
                AppError::MissingConfiguration(format!("Invalid credential format: {}", e))
            })?;
        auth_header.set_sensitive(true);

        Ok(Self {
            client,
            wiki_root: base_url.wiki_root(),
            origin: base_url.as_url().origin().ascii_serialization(),
            auth_header,
            retry: RetryPolicy::default(),
            breaker: Arc::new(CircuitBreaker::default()),
            request_delay: Duration::ZERO,
            page_size: WIKI_API_PAGE_SIZE,
            cancel: CancellationToken::new(),
        })
    }

    /// Client for one export run: listings are throttled by the run's
    /// inter-request delay and every request observes `cancel`.
    pub fn for_run(
        connection: &ConnectionSettings,
        export: &ExportConfig,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        Ok(Self::new(&connection.base_url, &connection.credentials)?
            .with_request_delay(export.delay)
            .with_cancellation(cancel))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Delay slept between consecutive requests of one paginated listing.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Turns any URL found in the API or in page markup into an absolute URL.
    ///
    /// Paths under `/wiki` are relative to the tenant origin; other
    /// site-relative paths (API links, `/download/...`) to the wiki root.
    pub fn resolve_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else if let Some(rest) = raw.strip_prefix("//") {
            let scheme = self.origin.split("://").next().unwrap_or("https");
            format!("{}://{}", scheme, rest)
        } else if raw == "/wiki" || raw.starts_with("/wiki/") {
            format!("{}{}", self.origin, raw)
        } else if raw.starts_with('/') {
            format!("{}{}", self.wiki_root, raw)
        } else {
            format!("{}/{}", self.wiki_root, raw)
        }
    }

    fn api_url(&self, path_and_query: &str) -> String {
        format!("{}/rest/api/{}", self.wiki_root, path_and_query)
    }

    /// Credentials are only ever sent to the tenant itself.
    fn is_same_origin(&self, url: &str) -> bool {
        url.strip_prefix(&self.origin)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// GET with retries; `Ok(None)` on 404.
    async fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>, AppError> {
        retry_with_backoff(|| self.attempt(url), self.retry, &self.cancel).await
    }

    async fn attempt(&self, url: &str) -> Result<Option<Vec<u8>>, AppError> {
        self.breaker.try_acquire()?;

        let mut request = self.client.get(url);
        if self.is_same_origin(url) {
            request = request.header(header::AUTHORIZATION, self.auth_header.clone());
        }

        log::debug!("GET {}", url);

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.breaker.release();
                return Err(AppError::Cancelled);
            }
            outcome = Self::send(request, url) => outcome,
        };

        match &outcome {
            Err(e) if e.is_retryable() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }
        outcome
    }

    async fn send(
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Option<Vec<u8>>, AppError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            log::debug!("404 for {}", url);
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
            return Err(AppError::ApiService {
                code: ApiErrorCode::from_http_status(status.as_u16()),
                message: if preview.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    preview
                },
                url: url.to_string(),
            });
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, AppError> {
        match self.get_bytes(url).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::MalformedResponse(format!("{} ({})", e, url))),
            None => Ok(None),
        }
    }

    /// Fetches one page of a listing; a vanished listing reads as empty.
    async fn get_listing<T: DeserializeOwned>(
        &self,
        first_page: &str,
        cursor: PageCursor,
    ) -> Result<ListingResponse<T>, AppError> {
        let url = match cursor {
            PageCursor::Offset(start) => {
                let separator = if first_page.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}start={}&limit={}",
                    self.api_url(first_page),
                    separator,
                    start,
                    self.page_size
                )
            }
            PageCursor::Link(next) => self.resolve_url(&next),
        };

        Ok(self
            .get_json::<ListingResponse<T>>(&url)
            .await?
            .unwrap_or(ListingResponse {
                results: Vec::new(),
                start: None,
                limit: None,
                size: None,
                links: Default::default(),
            }))
    }

    async fn collect_listing<T: DeserializeOwned>(
        &self,
        strategy: PaginationStrategy,
        first_page: &str,
    ) -> Result<Vec<T>, AppError> {
        fetch_all_pages(
            strategy,
            self.page_size,
            self.request_delay,
            &self.cancel,
            |cursor| self.get_listing::<T>(first_page, cursor),
        )
        .await
    }
}

#[async_trait::async_trait]
impl WikiRepository for ConfluenceHttpClient {
    async fn list_spaces(&self) -> Result<Vec<Space>, AppError> {
        let raw: Vec<SpaceResponse> = self
            .collect_listing(PaginationStrategy::Cursor, "space")
            .await?;
        let spaces = raw
            .into_iter()
            .map(ToDomain::to_domain)
            .collect::<Result<Vec<Space>, _>>()?;
        log::info!("Found {} spaces", spaces.len());
        Ok(spaces)
    }

    async fn get_space(&self, key: &SpaceKey) -> Result<Option<Space>, AppError> {
        let url = self.api_url(&format!("space/{}", encode_path_segment(key.as_str())));
        self.get_json::<SpaceResponse>(&url)
            .await?
            .map(ToDomain::to_domain)
            .transpose()
    }

    async fn list_space_pages(&self, key: &SpaceKey) -> Result<Vec<Page>, AppError> {
        let first_page = format!(
            "content?spaceKey={}&type=page&expand={}",
            urlencode(key.as_str()),
            PAGE_EXPANSIONS
        );
        let raw: Vec<ContentResponse> = self
            .collect_listing(PaginationStrategy::OffsetLimit, &first_page)
            .await?;
        let pages = raw
            .into_iter()
            .map(ToDomain::to_domain)
            .collect::<Result<Vec<Page>, _>>()?;
        log::info!("Space {} has {} pages", key, pages.len());
        Ok(pages)
    }

    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, AppError> {
        let url = self.api_url(&format!(
            "content/{}?expand={}",
            encode_path_segment(id.as_str()),
            PAGE_EXPANSIONS
        ));
        self.get_json::<ContentResponse>(&url)
            .await?
            .map(ToDomain::to_domain)
            .transpose()
    }

    async fn list_page_children(&self, id: &PageId) -> Result<Vec<Page>, AppError> {
        let first_page = format!("content/{}/child/page", encode_path_segment(id.as_str()));
        let stubs: Vec<ContentStub> = self
            .collect_listing(PaginationStrategy::OffsetLimit, &first_page)
            .await?;

        let mut children = Vec::with_capacity(stubs.len());
        for stub in stubs {
            let child_id = PageId::from_api(stub.id);
            match self.get_page(&child_id).await? {
                Some(page) => children.push(page),
                None => log::debug!(
                    "Child '{}' ({}) of page {} disappeared before it could be fetched",
                    stub.title,
                    child_id,
                    id
                ),
            }
        }
        Ok(children)
    }

    async fn get_asset(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let url = self.resolve_url(url);
        self.get_bytes(&url)
            .await?
            .ok_or_else(|| AppError::ApiService {
                code: ApiErrorCode::NotFound,
                message: "asset not found".to_string(),
                url,
            })
    }
}

/// Query-string encoding.
fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}
