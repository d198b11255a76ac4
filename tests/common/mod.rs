// tests/common/mod.rs
// Shared fakes for scheduler / pipeline tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use status_feed_watcher::{
    CachedValidators, EventSink, FeedFetcher, FeedSource, FetchError, FetchResult, Incident,
};

/// Atom document with one entry per id, newest first as given.
pub fn atom_feed(ids: &[&str]) -> String {
    let entries: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<entry>
  <id>{id}</id>
  <title>Elevated errors {id} on Responses API</title>
  <link rel="alternate" href="https://status.example.test/incidents/{id}"/>
  <published>2025-09-06T09:00:00Z</published>
  <updated>2025-09-06T09:30:00Z</updated>
  <summary type="html">&lt;p&gt;Investigating - errors for {id}&lt;/p&gt;</summary>
</entry>
"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<title>Test status</title>
{entries}</feed>"#
    )
}

#[derive(Debug, Clone)]
pub enum Step {
    Ok {
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    NotModified,
    Status(u16),
    /// Never answers within any sane timeout.
    Hang,
}

impl Step {
    pub fn ok(body: String, etag: &str) -> Self {
        Step::Ok {
            body,
            etag: Some(etag.to_string()),
            last_modified: None,
        }
    }
}

/// Replays scripted responses per source name and records the validators
/// each call was made with. An exhausted script answers 304.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    pub calls: Mutex<Vec<(String, CachedValidators)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, source: &str, step: Step) {
        self.scripts
            .lock()
            .entry(source.to_string())
            .or_default()
            .push_back(step);
    }

    pub fn calls_for(&self, source: &str) -> Vec<CachedValidators> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| s == source)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &FeedSource, validators: &CachedValidators) -> FetchResult {
        self.calls
            .lock()
            .push((source.name.clone(), validators.clone()));
        let step = self
            .scripts
            .lock()
            .get_mut(&source.name)
            .and_then(|q| q.pop_front())
            .unwrap_or(Step::NotModified);

        match step {
            Step::Ok {
                body,
                etag,
                last_modified,
            } => FetchResult::Changed {
                body: body.into_bytes(),
                validators: CachedValidators {
                    etag,
                    last_modified,
                },
            },
            Step::NotModified => FetchResult::Unchanged,
            Step::Status(code) => FetchResult::Failed(FetchError::UnexpectedStatus(code)),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                FetchResult::Unchanged
            }
        }
    }
}

/// Collects every delivered incident.
#[derive(Default)]
pub struct RecordingSink {
    pub got: Mutex<Vec<Incident>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        self.got
            .lock()
            .iter()
            .map(|i| (i.source_name.clone(), i.id.clone()))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn handle(&self, incident: Incident) {
        self.got.lock().push(incident);
    }
}

/// Bind an axum app on an ephemeral local port.
pub async fn spawn_server(app: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

/// A status page that honours `If-None-Match` against its current ETag and
/// records the validators of every request.
#[derive(Default)]
pub struct FeedServer {
    pub body: Mutex<String>,
    pub etag: Mutex<String>,
    pub last_modified: Mutex<Option<String>>,
    pub requests: Mutex<Vec<CachedValidators>>,
}

impl FeedServer {
    pub fn new(body: String, etag: &str, last_modified: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(body),
            etag: Mutex::new(etag.to_string()),
            last_modified: Mutex::new(last_modified.map(str::to_string)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn publish(&self, body: String, etag: &str, last_modified: Option<&str>) {
        *self.body.lock() = body;
        *self.etag.lock() = etag.to_string();
        *self.last_modified.lock() = last_modified.map(str::to_string);
    }

    pub fn router(self: &Arc<Self>) -> axum::Router {
        use axum::extract::State;
        use axum::http::{header, HeaderMap, StatusCode};
        use axum::response::{IntoResponse, Response};
        use axum::routing::get;

        async fn feed(State(srv): State<Arc<FeedServer>>, headers: HeaderMap) -> Response {
            let read = |name: header::HeaderName| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let seen = CachedValidators {
                etag: read(header::IF_NONE_MATCH),
                last_modified: read(header::IF_MODIFIED_SINCE),
            };
            srv.requests.lock().push(seen.clone());

            let etag = srv.etag.lock().clone();
            if seen.etag.as_deref() == Some(etag.as_str()) {
                return StatusCode::NOT_MODIFIED.into_response();
            }
            let mut resp = (StatusCode::OK, srv.body.lock().clone()).into_response();
            let h = resp.headers_mut();
            h.insert(header::CONTENT_TYPE, "application/atom+xml".parse().unwrap());
            h.insert(header::ETAG, etag.parse().unwrap());
            if let Some(lm) = srv.last_modified.lock().clone() {
                h.insert(header::LAST_MODIFIED, lm.parse().unwrap());
            }
            resp
        }

        axum::Router::new()
            .route("/history.atom", get(feed))
            .with_state(Arc::clone(self))
    }
}
