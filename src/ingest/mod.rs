// src/ingest/mod.rs
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod parser;
pub mod registry;
pub mod scheduler;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Describe every series against the current recorder. Call again after
/// installing a recorder; descriptions sent to the no-op recorder are lost.
pub fn describe_metrics() {
    describe_counter!(
        "feed_fetch_total",
        "Conditional fetches by source and outcome."
    );
    describe_counter!(
        "feed_parse_errors_total",
        "Changed feed bodies that failed to parse."
    );
    describe_counter!(
        "incidents_parsed_total",
        "Incidents parsed from changed feeds."
    );
    describe_counter!(
        "incidents_emitted_total",
        "New incidents delivered to the sink."
    );
    describe_counter!(
        "incidents_synced_total",
        "Incidents marked seen during initial sync without emission."
    );
    describe_counter!(
        "incidents_unmatched_total",
        "New incidents held back because they named no product."
    );
    describe_counter!("scheduler_ticks_total", "Completed poll ticks.");
    describe_histogram!("feed_fetch_ms", "Fetch duration in milliseconds.");
    describe_gauge!(
        "scheduler_last_tick_ts",
        "Unix ts when the last poll tick started."
    );
}

/// Strip markup to plain text, one line per block element.
pub fn strip_html(s: &str) -> String {
    static RE_BLOCK: OnceCell<regex::Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_HWS: OnceCell<regex::Regex> = OnceCell::new();
    let re_block = RE_BLOCK.get_or_init(|| {
        regex::Regex::new(
            r"(?i)<\s*(?:br|/?p|/?div|/?li|/?ul|/?ol|/?h[1-6]|/?tr|/?table|/?blockquote|/?pre)\b[^>]*>",
        )
        .unwrap()
    });
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]*>").unwrap());
    let re_hws = RE_HWS.get_or_init(|| regex::Regex::new(r"[^\S\n]+").unwrap());

    // 1) Block boundaries become newlines, other tags vanish
    let out = re_block.replace_all(s, "\n");
    let out = re_tags.replace_all(&out, "");

    // 2) Decode entities only after tags are gone, so "&lt;b&gt;" stays text
    let out = html_escape::decode_html_entities(&out);

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Fold whitespace per line, drop blank lines
    out.lines()
        .map(|line| re_hws.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_keeps_block_breaks() {
        let s = "<p>Hello&nbsp;<b>world</b></p><p>Second&amp;line</p>";
        assert_eq!(strip_html(s), "Hello world\nSecond&line");
    }

    #[test]
    fn strip_html_lists_and_br() {
        let s = "<ul><li>Files</li><li>Responses   </li></ul>after<br/>break";
        assert_eq!(strip_html(s), "Files\nResponses\nafter\nbreak");
    }

    #[test]
    fn decoded_entities_are_not_reparsed_as_tags() {
        assert_eq!(strip_html("a &lt;b&gt; c"), "a <b> c");
    }

    #[test]
    fn empty_and_whitespace_only() {
        assert_eq!(strip_html(""), "");
        assert_eq!(strip_html("  <p> </p>\n\n "), "");
    }
}
