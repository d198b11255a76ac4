// src/ingest/registry.rs
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ingest::extract::{ProductMatcher, ProductTable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String, // e.g. "OpenAI"
    pub url: String,
    /// Product table applied to this source's entries; none means only
    /// categories and "Affected components" name products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<ProductTable>,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            products: None,
        }
    }

    pub fn with_products(mut self, table: ProductTable) -> Self {
        self.products = Some(table);
        self
    }
}

/// Immutable list of sources, built once at startup.
#[derive(Debug, Clone)]
pub struct Registry {
    sources: Vec<Arc<FeedSource>>,
    /// Compiled product table per source, same order as `sources`.
    matchers: Vec<ProductMatcher>,
}

impl Registry {
    /// Validates names and urls. Names are trimmed; duplicates are compared
    /// case-insensitively because the name is half of the dedup key.
    pub fn new(sources: Vec<FeedSource>) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut names = HashSet::new();
        let mut out = Vec::with_capacity(sources.len());
        let mut matchers = Vec::with_capacity(sources.len());
        for src in sources {
            let name = src.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptySourceName);
            }
            if !names.insert(name.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateSource(name));
            }
            let url = src.url.trim().to_string();
            if !is_http_url(&url) {
                return Err(ConfigError::InvalidUrl { name, url });
            }
            let matcher = match &src.products {
                Some(table) => table.matcher()?,
                None => ProductMatcher::empty(),
            };
            matchers.push(matcher);
            out.push(Arc::new(FeedSource {
                name,
                url,
                products: src.products,
            }));
        }

        Ok(Self {
            sources: out,
            matchers,
        })
    }

    pub fn sources(&self) -> &[Arc<FeedSource>] {
        &self.sources
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FeedSource>> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn matcher(&self, name: &str) -> Option<&ProductMatcher> {
        self.sources
            .iter()
            .position(|s| s.name == name)
            .map(|i| &self.matchers[i])
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn is_http_url(raw: &str) -> bool {
    match reqwest::Url::parse(raw) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}
