//! One-shot check of a feed: `feed-probe <path-or-url> [source-name]`.
//! Prints every parsed incident, not just new ones. When `source-name` is a
//! configured source, its product table is used.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use status_feed_watcher::config::load_config_default;
use status_feed_watcher::ingest::extract::ProductMatcher;
use status_feed_watcher::notify::OutputFormat;
use status_feed_watcher::{
    CachedValidators, ConsoleSink, EventSink, FeedFetcher, FeedParser, FeedSource, FetchResult,
    HttpFetcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!("usage: feed-probe <path-or-url> [source-name]");
    };
    let name = args.next().unwrap_or_else(|| "probe".to_string());

    let body = if target.starts_with("http://") || target.starts_with("https://") {
        let fetcher = HttpFetcher::new(Duration::from_secs(10), "status-feed-watcher/probe")?;
        let source = FeedSource::new(name.clone(), target.clone());
        match fetcher.fetch(&source, &CachedValidators::default()).await {
            FetchResult::Changed { body, validators } => {
                tracing::info!(etag = ?validators.etag, last_modified = ?validators.last_modified, "fetched");
                body
            }
            FetchResult::Unchanged => bail!("server answered 304 to an unconditional request"),
            FetchResult::Failed(e) => return Err(e).context("fetching feed"),
        }
    } else {
        std::fs::read(&target).with_context(|| format!("reading {target}"))?
    };

    let matcher = match load_config_default().and_then(|c| Ok(c.validate()?)) {
        Ok(rt) => rt.registry.matcher(&name).cloned().unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "no usable watcher config, parsing without a product table");
            ProductMatcher::empty()
        }
    };
    let incidents = FeedParser::new(matcher)
        .parse(&name, &body)
        .context("parsing feed")?;
    let sink = ConsoleSink::new(OutputFormat::Text);
    let count = incidents.len();
    for inc in incidents {
        sink.handle(inc);
    }
    tracing::info!(count, "done");
    Ok(())
}
