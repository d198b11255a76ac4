// src/config/watcher.rs
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ingest::extract::{BuiltinTable, ProductTable};
use crate::ingest::registry::{FeedSource, Registry};
use crate::ingest::scheduler::SchedulerCfg;
use crate::notify::OutputFormat;

pub const ENV_CONFIG_PATH: &str = "WATCHER_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/watcher.toml";
pub const DEFAULT_JSON_PATH: &str = "config/watcher.json";

fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new("OpenAI", "https://status.openai.com/history.atom")
            .with_products(ProductTable::Builtin(BuiltinTable::Openai)),
    ]
}

fn default_user_agent() -> String {
    format!("status-feed-watcher/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    pub sources: Vec<FeedSource>,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Emit everything found on a source's first sync instead of only marking it seen.
    pub emit_on_initial_sync: bool,
    /// Re-emit an entry when its `updated` timestamp changes.
    pub track_updates: bool,
    pub user_agent: String,
    pub output: OutputFormat,
    /// Deliver only incidents that name at least one product. The rest are
    /// still marked seen.
    pub only_matching_products: bool,
    /// Serve Prometheus `/metrics` here when set.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            poll_interval_secs: 30,
            fetch_timeout_secs: 10,
            emit_on_initial_sync: false,
            track_updates: false,
            user_agent: default_user_agent(),
            output: OutputFormat::Text,
            only_matching_products: false,
            metrics_addr: None,
        }
    }
}

/// Validated pieces the binary wires together.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub registry: Registry,
    pub scheduler: SchedulerCfg,
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<RuntimeConfig, ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("poll_interval_secs"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("fetch_timeout_secs"));
        }
        let registry = Registry::new(self.sources.clone())?;
        Ok(RuntimeConfig {
            registry,
            scheduler: SchedulerCfg {
                poll_interval: Duration::from_secs(self.poll_interval_secs),
                fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
                emit_on_initial_sync: self.emit_on_initial_sync,
                track_updates: self.track_updates,
                only_matching_products: self.only_matching_products,
            },
        })
    }

    /// Process env overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    /// Unparsable values are logged and ignored.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = parsed(&get, "POLL_INTERVAL_SECS", |s| s.parse::<u64>().ok()) {
            self.poll_interval_secs = v;
        }
        if let Some(v) = parsed(&get, "FETCH_TIMEOUT_SECS", |s| s.parse::<u64>().ok()) {
            self.fetch_timeout_secs = v;
        }
        if let Some(v) = parsed(&get, "EMIT_ON_INITIAL_SYNC", parse_bool) {
            self.emit_on_initial_sync = v;
        }
        if let Some(v) = parsed(&get, "TRACK_UPDATES", parse_bool) {
            self.track_updates = v;
        }
        if let Some(v) = parsed(&get, "ONLY_MATCHING_PRODUCTS", parse_bool) {
            self.only_matching_products = v;
        }
        if let Some(v) = parsed(&get, "METRICS_ADDR", |s| s.parse::<SocketAddr>().ok()) {
            self.metrics_addr = Some(v);
        }
        if let Some(v) = parsed(&get, "OUTPUT_FORMAT", |s| s.parse::<OutputFormat>().ok()) {
            self.output = v;
        }
    }
}

fn parsed<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = get(key)?;
    let out = parse(raw.trim());
    if out.is_none() {
        tracing::warn!(key, value = %raw, "ignoring unparsable env override");
    }
    out
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<WatcherConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading watcher config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing watcher config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $WATCHER_CONFIG_PATH
/// 2) config/watcher.toml
/// 3) config/watcher.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<WatcherConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(WatcherConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatcherConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: JSON documents start with '{'.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}")),
    }
}
