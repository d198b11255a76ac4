// src/notify/console.rs
use std::io::Write;

use serde::{Deserialize, Serialize};

use super::EventSink;
use crate::incident::Incident;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unsupported output format `{other}`"),
        }
    }
}

/// Reference sink: one line per incident on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, inc: &Incident) -> String {
        match self.format {
            OutputFormat::Text => render_line(inc),
            OutputFormat::Json => serde_json::to_string(inc).unwrap_or_else(|_| render_line(inc)),
        }
    }
}

fn render_line(inc: &Incident) -> String {
    let products = if inc.affected_products.is_empty() {
        "-".to_string()
    } else {
        inc.affected_products.join(", ")
    };
    let status = if inc.status.is_empty() {
        "-"
    } else {
        inc.status.as_str()
    };
    format!(
        "[{}] {} | {} | {} | {} | {}",
        inc.published_at.format("%Y-%m-%d %H:%M:%S UTC"),
        inc.source_name,
        products,
        inc.title,
        status,
        inc.link
    )
}

impl EventSink for ConsoleSink {
    fn handle(&self, incident: Incident) {
        let line = self.render(&incident);
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "stdout write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::sample;

    #[test]
    fn text_line_has_all_fields() {
        let line = ConsoleSink::new(OutputFormat::Text).render(&sample("a"));
        assert_eq!(
            line,
            "[1970-01-01 00:00:00 UTC] OpenAI | OpenAI API | Incident a | Investigating | https://status.example.test/incidents/a"
        );
    }

    #[test]
    fn empty_fields_render_as_dash() {
        let mut inc = sample("a");
        inc.status.clear();
        inc.affected_products.clear();
        let line = ConsoleSink::default().render(&inc);
        assert!(line.contains("| - | Incident a | - |"), "{line}");
    }

    #[test]
    fn json_line_round_trips() {
        let inc = sample("a");
        let line = ConsoleSink::new(OutputFormat::Json).render(&inc);
        let back: Incident = serde_json::from_str(&line).unwrap();
        assert_eq!(back, inc);
    }

    #[test]
    fn format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
