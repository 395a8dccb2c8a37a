use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const USER_AGENT: &str = concat!("pagetree/", env!("CARGO_PKG_VERSION"));

/// Status line and body of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Retrieves raw documents. Non-success statuses are returned, not raised;
/// the caller decides what counts as a usable page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        (**self).fetch(url).await
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }
}

/// Memoizes successful fetches by exact URL string. Errors are not cached.
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<HashMap<String, FetchResponse>>,
}

impl<F: Fetcher> CachedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        if let Some(hit) = self.cache.lock().await.get(url) {
            debug!("Cache hit for {}", url);
            return Ok(hit.clone());
        }

        let response = self.inner.fetch(url).await?;
        self.cache
            .lock()
            .await
            .insert(url.to_string(), response.clone());
        Ok(response)
    }
}

/// Maps a non-200 response to [`ScanError::Status`].
pub fn require_ok(url: &str, response: FetchResponse) -> Result<FetchResponse> {
    if response.status == 200 {
        Ok(response)
    } else {
        Err(ScanError::Status {
            status: response.status,
            url: url.to_string(),
        })
    }
}
