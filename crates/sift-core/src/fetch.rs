//! Paginated document feed from the CMS.
//!
//! Each configured content type is enumerated page by page (up to 100 pages
//! of 50 documents, a hard cap of 5000 per type). Transient failures are
//! retried with capped exponential backoff; a missing type endpoint or an
//! auth failure is reported for that type without aborting the others.
//! Documents flow through a bounded channel so chunking and embedding can
//! pipeline behind the fetch.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::config::ContentConfig;
use crate::types::Document;

const MAX_ATTEMPTS: usize = 3;
const BACKOFF_BASE_MS: u64 = 200;
const BACKOFF_CAP_MS: u64 = 2_000;

#[derive(Debug)]
pub enum PageOutcome {
    Documents(Vec<Document>),
    /// Past the last page (the CMS rejects out-of-range page numbers).
    EndOfPagination,
    /// The type endpoint does not exist.
    TypeMissing,
    Unauthorized,
}

/// Seam over the CMS REST feed; `Err` means a transient failure worth
/// retrying (5xx, timeout, connection refused).
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_page(
        &self,
        content_type: &str,
        page: usize,
        per_page: usize,
    ) -> Result<PageOutcome>;
}

pub struct HttpContentSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentSource {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build content HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_page(
        &self,
        content_type: &str,
        page: usize,
        per_page: usize,
    ) -> Result<PageOutcome> {
        let url = format!(
            "{}/{}?page={}&per_page={}",
            self.base_url, content_type, page, per_page
        );
        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("content feed timed out fetching {}", url)
            } else {
                anyhow!("content feed request to {} failed: {}", url, e)
            }
        })?;

        match response.status().as_u16() {
            200 => {
                let documents: Vec<Document> = response
                    .json()
                    .await
                    .with_context(|| format!("invalid document list from {}", url))?;
                if documents.is_empty() {
                    Ok(PageOutcome::EndOfPagination)
                } else {
                    Ok(PageOutcome::Documents(documents))
                }
            }
            // The CMS answers 400 for page numbers past the end.
            400 => Ok(PageOutcome::EndOfPagination),
            404 => Ok(PageOutcome::TypeMissing),
            401 | 403 => Ok(PageOutcome::Unauthorized),
            status if status >= 500 => Err(anyhow!("content feed returned HTTP {}", status)),
            status => Err(anyhow!(
                "content feed returned unexpected HTTP {} for {}",
                status,
                url
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub fetched: usize,
    pub skipped_types: Vec<String>,
    pub errors: Vec<String>,
}

impl FetchReport {
    fn merge(&mut self, other: FetchReport) {
        self.fetched += other.fetched;
        self.skipped_types.extend(other.skipped_types);
        self.errors.extend(other.errors);
    }
}

pub struct ContentFetcher {
    source: Arc<dyn ContentSource>,
    page_size: usize,
    max_pages: usize,
    permits: Arc<Semaphore>,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn ContentSource>, config: &ContentConfig) -> Self {
        Self {
            source,
            page_size: config.page_size,
            max_pages: config.max_pages,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        }
    }

    /// Enumerate every document of the given types into `tx`. Types run
    /// concurrently; page fetches across all types share one in-flight
    /// bound. Returns once all types finish or the receiver goes away.
    pub async fn stream_documents(
        &self,
        types: &[String],
        tx: mpsc::Sender<Document>,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let outcomes: Vec<FetchReport> = stream::iter(types.iter().cloned())
            .map(|content_type| {
                let tx = tx.clone();
                async move { self.fetch_type(&content_type, tx).await }
            })
            .buffer_unordered(4)
            .collect()
            .await;
        for outcome in outcomes {
            report.merge(outcome);
        }
        report
    }

    async fn fetch_type(&self, content_type: &str, tx: mpsc::Sender<Document>) -> FetchReport {
        let mut report = FetchReport::default();
        let cap = self.max_pages * self.page_size;

        for page in 1..=self.max_pages {
            let outcome = match self.fetch_page_with_retry(content_type, page).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    report.errors.push(format!(
                        "{} page {}: {:#}",
                        content_type, page, e
                    ));
                    break;
                }
            };

            match outcome {
                PageOutcome::Documents(documents) => {
                    let page_len = documents.len();
                    for document in documents {
                        if report.fetched >= cap {
                            break;
                        }
                        if tx.send(document).await.is_err() {
                            // Consumer gone; nothing left to do.
                            return report;
                        }
                        report.fetched += 1;
                    }
                    if page_len < self.page_size || report.fetched >= cap {
                        break;
                    }
                }
                PageOutcome::EndOfPagination => break,
                PageOutcome::TypeMissing => {
                    tracing::warn!(content_type, "unknown content type, skipping");
                    report.skipped_types.push(content_type.to_string());
                    break;
                }
                PageOutcome::Unauthorized => {
                    report
                        .errors
                        .push(format!("{}: unauthorized (check API credentials)", content_type));
                    break;
                }
            }
        }

        tracing::info!(
            content_type,
            fetched = report.fetched,
            "content type enumeration finished"
        );
        report
    }

    async fn fetch_page_with_retry(&self, content_type: &str, page: usize) -> Result<PageOutcome> {
        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            let _permit = self
                .permits
                .acquire()
                .await
                .expect("fetch semaphore never closes");
            match self.source.fetch_page(content_type, page, self.page_size).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    tracing::warn!(
                        content_type,
                        page,
                        attempt,
                        error = %e,
                        "transient fetch failure"
                    );
                    last_error = Some(e);
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                let backoff = (BACKOFF_BASE_MS << attempt).min(BACKOFF_CAP_MS);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        Err(last_error.expect("at least one attempt ran"))
    }
}
