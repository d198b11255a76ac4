// src/ingest/extract.rs
//! Best-effort status / product extraction from entry text.
//! Nothing here fails: unknown input yields `""` / an empty list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Update phases published by status pages, canonical capitalization.
const PHASES: &[&str] = &[
    "Investigating",
    "Identified",
    "Monitoring",
    "Resolved",
    "Update",
    "Scheduled",
    "In progress",
    "Verifying",
    "Completed",
    "Postmortem",
];

/// Impact phrases; only searched for when no phase was found.
const IMPACTS: &[&str] = &[
    "Degraded performance",
    "Partial outage",
    "Full outage",
    "Major outage",
];

static RE_STATUS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*status\s*:\s*(.+?)\s*$").unwrap());
static RE_IMPACT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•·]\s*").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductPattern {
    pub needle: String,
    pub label: String,
}

impl ProductPattern {
    pub fn new(needle: &str, label: &str) -> Self {
        Self {
            needle: needle.to_string(),
            label: label.to_string(),
        }
    }
}

pub const DEFAULT_PRODUCT_FALLBACK: &str = "OpenAI API";

/// The OpenAI API product table, most specific needles first.
pub fn default_product_patterns() -> Vec<ProductPattern> {
    [
        ("chat/completions", "OpenAI API - Chat Completions"),
        ("chat completions", "OpenAI API - Chat Completions"),
        ("responses api", "OpenAI API - Responses"),
        ("assistants api", "OpenAI API - Assistants"),
        ("realtime api", "OpenAI API - Realtime"),
        ("files api", "OpenAI API - Files"),
        ("file api", "OpenAI API - Files"),
        ("embeddings api", "OpenAI API - Embeddings"),
        ("embeddings", "OpenAI API - Embeddings"),
        ("fine-tuning api", "OpenAI API - Fine-tuning"),
        ("fine tuning api", "OpenAI API - Fine-tuning"),
        ("openai api", "OpenAI API"),
    ]
    .into_iter()
    .map(|(n, l)| ProductPattern::new(n, l))
    .collect()
}

/// Built-in product tables a source can opt into by name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinTable {
    Openai,
}

/// Per-source product table: `products = "openai"`, or an explicit list of
/// patterns with an optional fallback label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProductTable {
    Builtin(BuiltinTable),
    Custom {
        patterns: Vec<ProductPattern>,
        #[serde(default)]
        fallback: Option<String>,
    },
}

impl ProductTable {
    pub fn matcher(&self) -> Result<ProductMatcher, ConfigError> {
        match self {
            ProductTable::Builtin(BuiltinTable::Openai) => Ok(ProductMatcher::openai()),
            ProductTable::Custom { patterns, fallback } => {
                ProductMatcher::new(patterns.clone(), fallback.clone())
            }
        }
    }
}

/// Case-insensitive substring table. `fallback` is used when no needle hit
/// but the text mentions "api" as a word. The default table is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMatcher {
    patterns: Vec<(String, String)>,
    fallback: Option<String>,
}

impl ProductMatcher {
    pub fn new(
        patterns: Vec<ProductPattern>,
        fallback: Option<String>,
    ) -> Result<Self, ConfigError> {
        let fallback = match fallback.map(|f| f.trim().to_string()) {
            Some(f) if f.is_empty() => return Err(ConfigError::InvalidProductPattern),
            other => other,
        };
        Ok(Self {
            patterns: normalize_patterns(patterns)?,
            fallback,
        })
    }

    /// OpenAI API table with the `OpenAI API` fallback.
    pub fn openai() -> Self {
        Self {
            patterns: normalize_patterns(default_product_patterns()).unwrap_or_default(),
            fallback: Some(DEFAULT_PRODUCT_FALLBACK.to_string()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn matches(&self, text: &str) -> Vec<String> {
        let hay = text.to_lowercase();
        let mut out: Vec<String> = Vec::new();
        for (needle, label) in &self.patterns {
            if hay.contains(needle.as_str()) && !out.contains(label) {
                out.push(label.clone());
            }
        }
        if out.is_empty() {
            if let Some(fb) = &self.fallback {
                if hay
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|w| w == "api")
                {
                    out.push(fb.clone());
                }
            }
        }
        out
    }
}

/// Phase or impact of an entry; `""` when none is recognizable.
pub fn detect_status(title: &str, summary: &str) -> String {
    // 1) explicit "Status: X" line
    if let Some(c) = RE_STATUS_LINE.captures(summary) {
        let raw = c[1].trim();
        return canonical(raw).unwrap_or(raw).to_string();
    }

    // 2) a line opening with a phase word, e.g. "Resolved - This incident ..."
    for line in summary.lines() {
        let line = line.trim();
        for phase in PHASES {
            if let Some(rest) = strip_prefix_ci(line, phase) {
                let rest = rest.trim_start();
                if rest.is_empty() || rest.starts_with('-') || rest.starts_with(':') {
                    return (*phase).to_string();
                }
            }
        }
    }

    // 3) tag in the title ("[Resolved] ...") or an impact phrase anywhere
    let text = format!("{title}\n{summary}").to_lowercase();
    for phase in PHASES {
        if text.contains(&format!("[{}]", phase.to_lowercase())) {
            return (*phase).to_string();
        }
    }
    for impact in IMPACTS {
        if text.contains(&impact.to_lowercase()) {
            return (*impact).to_string();
        }
    }
    String::new()
}

/// Products named by the entry, first occurrence order, no duplicates.
pub fn detect_products(
    categories: &[String],
    title: &str,
    summary: &str,
    matcher: &ProductMatcher,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(s)) {
            out.push(s.to_string());
        }
    };

    for c in categories {
        push(c);
    }
    for c in affected_components(summary) {
        push(&c);
    }
    for c in matcher.matches(&format!("{title} {summary}")) {
        push(&c);
    }
    out
}

/// Items listed under an "Affected components" heading. An item is a line
/// with a bullet or a trailing "(Degraded performance)" style impact, which
/// is removed. The list ends at the first line that is neither.
fn affected_components(summary: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut lines = summary.lines().map(str::trim);
    let found = lines.by_ref().any(|l| {
        let l = l.trim_end_matches(':');
        l.eq_ignore_ascii_case("affected components")
            || l.eq_ignore_ascii_case("components affected")
    });
    if !found {
        return out;
    }
    for line in lines.skip_while(|l| l.is_empty()) {
        let bulleted = RE_BULLET.is_match(line);
        let with_impact = RE_IMPACT_SUFFIX.is_match(line);
        if !bulleted && !with_impact {
            break;
        }
        let item = RE_BULLET.replace(line, "");
        let item = RE_IMPACT_SUFFIX.replace(&item, "");
        if !item.is_empty() {
            out.push(item.to_string());
        }
    }
    out
}

fn normalize_patterns(patterns: Vec<ProductPattern>) -> Result<Vec<(String, String)>, ConfigError> {
    let mut out = Vec::with_capacity(patterns.len());
    for p in patterns {
        let needle = p.needle.trim().to_lowercase();
        let label = p.label.trim().to_string();
        if needle.is_empty() || label.is_empty() {
            return Err(ConfigError::InvalidProductPattern);
        }
        out.push((needle, label));
    }
    Ok(out)
}

fn canonical(raw: &str) -> Option<&'static str> {
    PHASES
        .iter()
        .chain(IMPACTS)
        .find(|p| p.eq_ignore_ascii_case(raw))
        .copied()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_explicit_line() {
        assert_eq!(detect_status("x", "Status: resolved\nAll good"), "Resolved");
        assert_eq!(detect_status("x", "status: Under review"), "Under review");
    }

    #[test]
    fn status_from_leading_phase() {
        let s = "Resolved - This incident has been resolved.\nInvestigating - We are looking.";
        assert_eq!(detect_status("Elevated errors", s), "Resolved");
        // "Updates" is not "Update -"
        assert_eq!(detect_status("x", "Updates are rolling out"), "");
    }

    #[test]
    fn status_from_impact_phrase() {
        assert_eq!(
            detect_status("Partial outage of Files", "We are aware."),
            "Partial outage"
        );
        assert_eq!(detect_status("[Monitoring] Login", ""), "Monitoring");
    }

    #[test]
    fn products_merge_sources_in_order() {
        let summary = "Affected components\nResponses (Degraded performance)\n- Files (Partial outage)\n\nmore text about embeddings";
        let cats = vec!["API".to_string()];
        let p = detect_products(&cats, "Errors", summary, &ProductMatcher::openai());
        assert_eq!(
            p,
            vec!["API", "Responses", "Files", "OpenAI API - Embeddings"]
        );
    }

    #[test]
    fn generic_api_fallback_needs_whole_word() {
        let m = ProductMatcher::openai();
        assert_eq!(m.matches("Elevated API latency"), vec!["OpenAI API"]);
        assert!(m.matches("rapid rollout").is_empty());
        assert!(ProductMatcher::empty().matches("api").is_empty());
    }

    #[test]
    fn tables_deserialize_by_name_or_list() {
        #[derive(Deserialize)]
        struct Holder {
            products: ProductTable,
        }
        let h: Holder = toml::from_str(r#"products = "openai""#).unwrap();
        assert_eq!(h.products, ProductTable::Builtin(BuiltinTable::Openai));
        assert_eq!(h.products.matcher().unwrap(), ProductMatcher::openai());

        let h: Holder = toml::from_str(
            r#"
[products]
patterns = [{ needle = "Actions", label = "GitHub Actions" }]
"#,
        )
        .unwrap();
        let m = h.products.matcher().unwrap();
        assert_eq!(m.matches("Actions runs are delayed"), vec!["GitHub Actions"]);
        // No fallback configured: a bare "API" stays unlabelled.
        assert!(m.matches("REST API latency").is_empty());

        assert!(toml::from_str::<Holder>(r#"products = "nope""#).is_err());
    }

    #[test]
    fn default_table_labels_nothing() {
        let p = detect_products(&[], "Elevated API errors for embeddings", "", &ProductMatcher::default());
        assert!(p.is_empty());
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = ProductMatcher::new(vec![ProductPattern::new(" ", "x")], None).unwrap_err();
        assert_eq!(err, ConfigError::InvalidProductPattern);
        let err = ProductMatcher::new(vec![], Some("  ".into())).unwrap_err();
        assert_eq!(err, ConfigError::InvalidProductPattern);
    }
}
