use crate::error::{Result, ScanError};
use crate::fetch::USER_AGENT;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const OPEN_PAGERANK_ENDPOINT: &str = "https://openpagerank.com/api/v1.0/getPageRank";

#[async_trait]
pub trait RankProvider: Send + Sync {
    async fn rank(&self, url: &str) -> Result<f64>;
}

/// Returns the same score for every URL.
#[derive(Debug, Clone, Copy)]
pub struct StaticRank(pub f64);

#[async_trait]
impl RankProvider for StaticRank {
    async fn rank(&self, _url: &str) -> Result<f64> {
        Ok(self.0)
    }
}

/// Domain-level rank from the Open PageRank HTTP API.
pub struct OpenPageRank {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RankEnvelope {
    #[serde(default)]
    response: Vec<DomainRank>,
}

#[derive(Debug, Deserialize)]
struct DomainRank {
    status_code: u16,
    #[serde(default)]
    error: String,
    page_rank_decimal: Option<f64>,
}

impl OpenPageRank {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: OPEN_PAGERANK_ENDPOINT.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn lookup_error(url: &str, reason: impl Into<String>) -> ScanError {
        ScanError::Lookup {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RankProvider for OpenPageRank {
    async fn rank(&self, url: &str) -> Result<f64> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| Self::lookup_error(url, "URL has no host"))?;

        debug!("Looking up rank for {}", host);

        let response = self
            .client
            .get(&self.endpoint)
            .header("API-OPR", &self.api_key)
            .query(&[("domains[]", host.as_str())])
            .send()
            .await
            .map_err(|e| Self::lookup_error(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::lookup_error(
                url,
                format!("rank service returned {}", response.status()),
            ));
        }

        let envelope: RankEnvelope = response
            .json()
            .await
            .map_err(|e| Self::lookup_error(url, format!("malformed response: {}", e)))?;

        let entry = envelope
            .response
            .into_iter()
            .next()
            .ok_or_else(|| Self::lookup_error(url, "empty response"))?;

        if entry.status_code != 200 {
            return Err(Self::lookup_error(url, entry.error));
        }

        entry
            .page_rank_decimal
            .ok_or_else(|| Self::lookup_error(url, "no rank for domain"))
    }
}
