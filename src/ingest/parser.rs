// src/ingest/parser.rs
//! Feed bytes → ordered incidents. Pure: no I/O, no clock, no hidden state.
//!
//! Atom (`<feed>`) and RSS 2.0 (`<rss>`) are recognized from the root element.
//! Entry identity, in order of preference:
//! 1. the feed's own id (`<id>` for Atom, `<guid>` for RSS), trimmed;
//! 2. the entry permalink;
//! 3. `sha256:<hex>` over title, raw publish date and raw body.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::ParseError;
use crate::incident::Incident;
use crate::ingest::extract::{detect_products, detect_status, ProductMatcher};
use crate::ingest::strip_html;

/// Element text with attributes ignored (`<title type="html">`).
#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

fn text(t: &Option<Text>) -> &str {
    t.as_ref().map(|t| t.value.trim()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<Text>,
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<Text>,
    updated: Option<Text>,
    summary: Option<Text>,
    content: Option<Text>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
    #[serde(rename = "@label")]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<Text>,
    link: Option<Text>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<Text>,
    description: Option<Text>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
}

/// Container-independent view of one entry, all fields raw.
struct RawEntry<'a> {
    native_id: &'a str,
    link: String,
    title: &'a str,
    body: &'a str,
    published: &'a str,
    updated: &'a str,
    categories: Vec<String>,
}

impl<'a> From<&'a AtomEntry> for RawEntry<'a> {
    fn from(e: &'a AtomEntry) -> Self {
        let summary = text(&e.summary);
        let body = if summary.is_empty() {
            text(&e.content)
        } else {
            summary
        };
        let link = e
            .links
            .iter()
            .filter(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .chain(e.links.iter())
            .find_map(|l| l.href.as_deref().map(str::trim).filter(|h| !h.is_empty()))
            .unwrap_or_default()
            .to_string();
        let published = match text(&e.published) {
            "" => text(&e.updated),
            p => p,
        };
        RawEntry {
            native_id: text(&e.id),
            link,
            title: text(&e.title),
            body,
            published,
            updated: text(&e.updated),
            categories: e
                .categories
                .iter()
                .filter_map(|c| c.label.as_deref().or(c.term.as_deref()))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }
}

impl<'a> From<&'a RssItem> for RawEntry<'a> {
    fn from(it: &'a RssItem) -> Self {
        RawEntry {
            native_id: text(&it.guid),
            link: text(&it.link).to_string(),
            title: text(&it.title),
            body: text(&it.description),
            published: text(&it.pub_date),
            updated: "",
            categories: it
                .categories
                .iter()
                .map(|c| c.value.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedParser {
    matcher: ProductMatcher,
}

impl FeedParser {
    pub fn new(matcher: ProductMatcher) -> Self {
        Self { matcher }
    }

    /// All-or-nothing: a malformed body yields `Err` and no incidents.
    pub fn parse(&self, source_name: &str, bytes: &[u8]) -> Result<Vec<Incident>, ParseError> {
        let xml = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
        let xml = scrub_html_entities_for_xml(xml.trim_start_matches('\u{feff}'));

        match root_element(&xml)?.as_str() {
            "feed" => {
                let feed: AtomFeed = from_str(&xml)?;
                Ok(feed
                    .entries
                    .iter()
                    .map(|e| self.build(source_name, RawEntry::from(e)))
                    .collect())
            }
            "rss" => {
                let rss: Rss = from_str(&xml)?;
                Ok(rss
                    .channel
                    .items
                    .iter()
                    .map(|it| self.build(source_name, RawEntry::from(it)))
                    .collect())
            }
            other => Err(ParseError::UnknownFormat(format!("root element <{other}>"))),
        }
    }

    fn build(&self, source_name: &str, raw: RawEntry<'_>) -> Incident {
        let title = strip_html(raw.title).replace('\n', " ");
        let body = if raw.body.is_empty() {
            raw.title
        } else {
            raw.body
        };
        let summary = strip_html(body);

        let id = if !raw.native_id.is_empty() {
            raw.native_id.to_string()
        } else if !raw.link.is_empty() {
            raw.link.clone()
        } else {
            let digest = Sha256::digest(format!("{}\n{}\n{}", raw.title, raw.published, raw.body));
            format!("sha256:{digest:x}")
        };

        Incident {
            id,
            source_name: source_name.to_string(),
            status: detect_status(&title, &summary),
            affected_products: detect_products(&raw.categories, &title, &summary, &self.matcher),
            title,
            summary,
            published_at: parse_timestamp(raw.published).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            updated_at: parse_timestamp(raw.updated),
            link: raw.link,
        }
    }
}

/// Parse without a product table.
pub fn parse_feed(source_name: &str, bytes: &[u8]) -> Result<Vec<Incident>, ParseError> {
    FeedParser::default().parse(source_name, bytes)
}

fn root_element(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                // Prefixed children would not bind to the unprefixed fields.
                if name.prefix().is_some() {
                    return Err(ParseError::UnknownFormat(format!(
                        "prefixed root element <{}>",
                        String::from_utf8_lossy(name.as_ref())
                    )));
                }
                return Ok(String::from_utf8_lossy(name.local_name().as_ref()).into_owned());
            }
            Event::Eof => return Err(ParseError::UnknownFormat("no root element".into())),
            _ => {}
        }
    }
}

/// RFC 3339 (Atom) or RFC 2822 (RSS).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
