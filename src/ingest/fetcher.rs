// src/ingest/fetcher.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};

use crate::error::FetchError;
use crate::ingest::registry::FeedSource;

/// HTTP validators remembered from the last 200 response of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedValidators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CachedValidators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }

    /// Absent headers yield `None`; a validator the server stopped sending is
    /// dropped rather than kept stale.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            etag: read(ETAG),
            last_modified: read(LAST_MODIFIED),
        }
    }
}

#[derive(Debug)]
pub enum FetchResult {
    Unchanged,
    Changed {
        body: Vec<u8>,
        validators: CachedValidators,
    },
    Failed(FetchError),
}

impl FetchResult {
    /// Short label used in logs and the `feed_fetch_total` counter.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            FetchResult::Unchanged => "unchanged",
            FetchResult::Changed { .. } => "changed",
            FetchResult::Failed(e) if e.is_timeout() => "timeout",
            FetchResult::Failed(_) => "failed",
        }
    }
}

/// One GET per call, no internal retry. Implementations must not mutate
/// anything; the caller stores the returned validators.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSource, validators: &CachedValidators) -> FetchResult;
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::from(e)
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, source: &FeedSource, validators: &CachedValidators) -> FetchResult {
        let mut req = self.client.get(&source.url);
        if let Some(etag) = &validators.etag {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(lm) = &validators.last_modified {
            req = req.header(IF_MODIFIED_SINCE, lm);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return FetchResult::Failed(self.classify(e)),
        };

        match resp.status() {
            StatusCode::NOT_MODIFIED => FetchResult::Unchanged,
            StatusCode::OK => {
                let fresh = CachedValidators::from_headers(resp.headers());
                match resp.bytes().await {
                    Ok(body) => FetchResult::Changed {
                        body: body.to_vec(),
                        validators: fresh,
                    },
                    Err(e) => FetchResult::Failed(self.classify(e)),
                }
            }
            other => FetchResult::Failed(FetchError::UnexpectedStatus(other.as_u16())),
        }
    }
}
