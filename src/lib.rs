// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod incident;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::{RuntimeConfig, WatcherConfig};
pub use crate::error::{ConfigError, FetchError, ParseError};
pub use crate::incident::Incident;
pub use crate::ingest::fetcher::{CachedValidators, FeedFetcher, FetchResult, HttpFetcher};
pub use crate::ingest::parser::{parse_feed, FeedParser};
pub use crate::ingest::registry::{FeedSource, Registry};
pub use crate::ingest::scheduler::{CycleOutcome, Scheduler, SchedulerCfg, TickReport};
pub use crate::notify::{ChannelSink, ConsoleSink, EventSink, SinkMux};
