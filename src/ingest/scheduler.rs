// src/ingest/scheduler.rs
//! Fixed-interval polling of every registered source.
//!
//! Each tick spawns one task per source; a source's task runs
//! fetch → parse → filter → emit strictly in sequence, and the only
//! suspension point is the fetch. The next tick waits until every task of
//! the current one has resolved, so no source ever has two cycles in flight.
//! Per-source state sits behind short synchronous locks that are never held
//! across the fetch, so diagnostics can read it while a cycle runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::ingest::dedup::{DedupStore, SeenSet};
use crate::ingest::fetcher::{CachedValidators, FeedFetcher, FetchResult};
use crate::ingest::parser::FeedParser;
use crate::ingest::registry::{FeedSource, Registry};
use crate::notify::EventSink;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    /// When false, the first successful sync of a source marks entries seen
    /// without emitting them.
    pub emit_on_initial_sync: bool,
    pub track_updates: bool,
    /// Hold back new incidents with no `affected_products`. They are still
    /// marked seen.
    pub only_matching_products: bool,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            emit_on_initial_sync: false,
            track_updates: false,
            only_matching_products: false,
        }
    }
}

/// What one source carries between ticks besides its seen-set.
#[derive(Debug, Default)]
pub struct SourceState {
    pub validators: CachedValidators,
    /// Set after the first changed body that parsed.
    pub synced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Unchanged,
    Failed(String),
    ParseFailed(String),
    /// Initial sync without emission.
    Synced { count: usize },
    Emitted { new: usize, parsed: usize },
    Cancelled,
    /// Previous cycle for this source still held its state.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// One entry per source, registry order.
    pub outcomes: Vec<(String, CycleOutcome)>,
}

impl TickReport {
    pub fn outcome(&self, source: &str) -> Option<&CycleOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, o)| o)
    }

    pub fn emitted(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                CycleOutcome::Emitted { new, .. } => *new,
                _ => 0,
            })
            .sum()
    }
}

struct Pipeline {
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn EventSink>,
    dedup: Mutex<DedupStore>,
    cfg: SchedulerCfg,
}

struct SourceSlot {
    source: Arc<FeedSource>,
    parser: Arc<FeedParser>,
    state: Arc<Mutex<SourceState>>,
    /// Held by the running cycle.
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

pub struct Scheduler {
    slots: Vec<SourceSlot>,
    pipeline: Arc<Pipeline>,
}

impl Scheduler {
    /// Each source is parsed with the product table the registry holds for it.
    pub fn new(
        registry: &Registry,
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn EventSink>,
        cfg: SchedulerCfg,
    ) -> Self {
        crate::ingest::ensure_metrics_described();
        let slots = registry
            .sources()
            .iter()
            .map(|s| SourceSlot {
                source: Arc::clone(s),
                parser: Arc::new(FeedParser::new(
                    registry.matcher(&s.name).cloned().unwrap_or_default(),
                )),
                state: Arc::new(Mutex::new(SourceState::default())),
                in_flight: Arc::new(tokio::sync::Mutex::new(())),
            })
            .collect();
        Self {
            slots,
            pipeline: Arc::new(Pipeline {
                fetcher,
                sink,
                dedup: Mutex::new(DedupStore::new(cfg.track_updates)),
                cfg,
            }),
        }
    }

    pub fn cfg(&self) -> SchedulerCfg {
        self.pipeline.cfg
    }

    /// Tick at the poll interval until `cancel` fires. A tick that overruns
    /// the interval is followed immediately by the next one.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.pipeline.cfg.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            target: "ingest",
            sources = self.slots.len(),
            interval_secs = self.pipeline.cfg.poll_interval.as_secs_f64(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.run_tick(&cancel).await;
            tracing::debug!(
                target: "ingest",
                emitted = report.emitted(),
                outcomes = ?report.outcomes,
                "poll tick"
            );
        }

        tracing::info!(target: "ingest", "scheduler stopped");
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// One round over all sources, concurrently. Returns once every source
    /// has resolved for this tick.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> TickReport {
        let now = chrono::Utc::now().timestamp().max(0);
        gauge!("scheduler_last_tick_ts").set(now as f64);

        let mut outcomes: Vec<CycleOutcome> = vec![CycleOutcome::Skipped; self.slots.len()];
        let mut tasks = JoinSet::new();

        for (idx, slot) in self.slots.iter().enumerate() {
            let Ok(guard) = Arc::clone(&slot.in_flight).try_lock_owned() else {
                tracing::warn!(target: "ingest", source = %slot.source.name, "previous cycle still running, skipping");
                continue;
            };
            // Overwritten when the task reports back.
            outcomes[idx] = CycleOutcome::Failed("cycle task aborted".into());

            let pipeline = Arc::clone(&self.pipeline);
            let source = Arc::clone(&slot.source);
            let parser = Arc::clone(&slot.parser);
            let state = Arc::clone(&slot.state);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let outcome = pipeline.run_cycle(&source, &parser, &state, &cancel).await;
                drop(guard);
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = outcome,
                Err(e) => tracing::error!(target: "ingest", error = %e, "poll task failed"),
            }
        }

        counter!("scheduler_ticks_total").increment(1);
        TickReport {
            outcomes: self
                .slots
                .iter()
                .map(|s| s.source.name.clone())
                .zip(outcomes)
                .collect(),
        }
    }

    /// Never waits for a running cycle.
    pub fn seen_count(&self, source: &str) -> Option<usize> {
        self.slot(source)?;
        let dedup = self.pipeline.dedup.lock();
        Some(dedup.seen(source).map_or(0, SeenSet::len))
    }

    pub fn validators(&self, source: &str) -> Option<CachedValidators> {
        let slot = self.slot(source)?;
        let validators = slot.state.lock().validators.clone();
        Some(validators)
    }

    fn slot(&self, source: &str) -> Option<&SourceSlot> {
        self.slots.iter().find(|s| s.source.name == source)
    }
}

impl Pipeline {
    async fn run_cycle(
        &self,
        source: &FeedSource,
        parser: &FeedParser,
        state: &Mutex<SourceState>,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        let t0 = Instant::now();
        let timeout = self.cfg.fetch_timeout;
        let cached = state.lock().validators.clone();

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: "ingest", source = %source.name, "fetch cancelled");
                return CycleOutcome::Cancelled;
            }
            r = tokio::time::timeout(timeout, self.fetcher.fetch(source, &cached)) => {
                r.unwrap_or(FetchResult::Failed(FetchError::Timeout(timeout)))
            }
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_fetch_ms", "source" => source.name.clone()).record(ms);
        counter!(
            "feed_fetch_total",
            "source" => source.name.clone(),
            "outcome" => fetched.outcome_label()
        )
        .increment(1);

        // No awaits past this point: an incident is either fully handled or
        // the cycle never got here.
        let (body, validators) = match fetched {
            FetchResult::Unchanged => {
                tracing::debug!(target: "ingest", source = %source.name, "feed unchanged");
                return CycleOutcome::Unchanged;
            }
            FetchResult::Failed(e) => {
                tracing::warn!(target: "ingest", source = %source.name, error = %e, "feed fetch failed");
                return CycleOutcome::Failed(e.to_string());
            }
            FetchResult::Changed { body, validators } => (body, validators),
        };
        state.lock().validators = validators;

        let parsed = match parser.parse(&source.name, &body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", source = %source.name, error = %e, "feed parse failed");
                counter!("feed_parse_errors_total", "source" => source.name.clone()).increment(1);
                return CycleOutcome::ParseFailed(e.to_string());
            }
        };
        let parsed_count = parsed.len();
        counter!("incidents_parsed_total", "source" => source.name.clone())
            .increment(parsed_count as u64);

        let initial = !std::mem::replace(&mut state.lock().synced, true);
        let fresh = self.dedup.lock().filter_new(&source.name, parsed);

        if initial && !self.cfg.emit_on_initial_sync {
            tracing::info!(
                target: "ingest",
                source = %source.name,
                marked_seen = fresh.len(),
                "initial sync, not emitting"
            );
            counter!("incidents_synced_total", "source" => source.name.clone())
                .increment(fresh.len() as u64);
            return CycleOutcome::Synced { count: fresh.len() };
        }

        let (fresh, unmatched): (Vec<_>, Vec<_>) = fresh.into_iter().partition(|inc| {
            !self.cfg.only_matching_products || !inc.affected_products.is_empty()
        });
        if !unmatched.is_empty() {
            tracing::debug!(
                target: "ingest",
                source = %source.name,
                held = unmatched.len(),
                "new incidents name no product, not emitting"
            );
            counter!("incidents_unmatched_total", "source" => source.name.clone())
                .increment(unmatched.len() as u64);
        }

        let new = fresh.len();
        for incident in fresh {
            tracing::info!(
                target: "ingest",
                source = %source.name,
                id = %incident.id,
                status = %incident.status,
                "new incident"
            );
            self.sink.handle(incident);
        }
        counter!("incidents_emitted_total", "source" => source.name.clone()).increment(new as u64);

        CycleOutcome::Emitted {
            new,
            parsed: parsed_count,
        }
    }
}
