//! Output formatting for price reports and histories (table, JSON, markdown, CSV).

use crate::config::OutputFormat;
use crate::models::ScrapeReport;
use crate::tcgplayer::FetchedPrice;
use serde::Serialize;
use serde_json::Value;

#[cfg(feature = "pokemontcg")]
use crate::pokemontcg::IndexReport;

/// Formats command results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a scrape run.
    pub fn format_scrape(&self, report: &ScrapeReport) -> String {
        match self.format {
            OutputFormat::Json => Self::json(report),
            OutputFormat::Table => self.table_scrape(report),
            OutputFormat::Markdown => self.markdown_scrape(report),
            OutputFormat::Csv => self.csv_scrape(report),
        }
    }

    /// Formats a fetched price that was not stored.
    pub fn format_price(&self, fetched: &FetchedPrice) -> String {
        match self.format {
            OutputFormat::Json => Self::json(fetched),
            OutputFormat::Table => {
                let lines = [
                    format!("Item:     {}", fetched.item),
                    format!("Price:    ${:.2}", fetched.price),
                    format!("Text:     {}", fetched.text),
                    format!("Strategy: {}", fetched.strategy),
                    format!("URL:      {}", fetched.url),
                ];
                lines.join("\n")
            }
            OutputFormat::Markdown => {
                let lines = [
                    format!("## {}", fetched.item),
                    String::new(),
                    format!("- **Market price:** ${:.2}", fetched.price),
                    format!("- **Found by:** {}", fetched.strategy),
                    format!("- **Source:** [TCGplayer search]({})", fetched.url),
                ];
                lines.join("\n")
            }
            OutputFormat::Csv => {
                let lines = [
                    "card_name,price_usd,strategy,url".to_string(),
                    format!(
                        "{},{},{},{}",
                        Self::csv_escape(&fetched.item),
                        fetched.price,
                        fetched.strategy,
                        Self::csv_escape(&fetched.url)
                    ),
                ];
                lines.join("\n")
            }
        }
    }

    /// Formats stored history entries, oldest first.
    pub fn format_history(&self, name: &str, entries: &[Value]) -> String {
        if entries.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => "timestamp,value".to_string(),
                _ => format!("No history for {}.", name),
            };
        }

        match self.format {
            OutputFormat::Json => Self::json(entries),
            OutputFormat::Table => self.table_history(name, entries),
            OutputFormat::Markdown => self.markdown_history(name, entries),
            OutputFormat::Csv => {
                let mut lines = vec!["timestamp,value".to_string()];
                for entry in entries {
                    let (timestamp, value) = Self::history_row(entry);
                    lines.push(format!("{},{}", Self::csv_escape(&timestamp), value));
                }
                lines.join("\n")
            }
        }
    }

    /// Formats the result of a set index run.
    #[cfg(feature = "pokemontcg")]
    pub fn format_index(&self, report: &IndexReport) -> String {
        if self.format == OutputFormat::Json {
            return Self::json(report);
        }

        let Some(snapshot) = &report.snapshot else {
            return format!("No prices found for set {}.", report.set_id);
        };

        match self.format {
            OutputFormat::Csv => {
                let mut lines = vec!["rank,id,name,market_usd".to_string()];
                for (i, card) in report.top.iter().enumerate() {
                    lines.push(format!(
                        "{},{},{},{}",
                        i + 1,
                        card.id,
                        Self::csv_escape(&card.name),
                        card.market_usd
                    ));
                }
                lines.join("\n")
            }
            OutputFormat::Markdown => {
                let mut lines = vec![
                    format!("## Set {} index: ${:.2}", report.set_id, snapshot.index_usd),
                    String::new(),
                    "| # | Card | Market |".to_string(),
                    "|---|------|--------|".to_string(),
                ];
                for (i, card) in report.top.iter().enumerate() {
                    lines.push(format!("| {} | {} | ${:.2} |", i + 1, card.name, card.market_usd));
                }
                lines.push(String::new());
                lines.push(format!("*{} cards priced*", report.cards_priced));
                lines.join("\n")
            }
            _ => {
                let mut lines = vec![
                    format!("Set:       {}", report.set_id),
                    format!(
                        "Index:     ${:.2} (top {} of {} priced cards)",
                        snapshot.index_usd,
                        report.top.len(),
                        report.cards_priced
                    ),
                    format!("Timestamp: {}", snapshot.timestamp),
                ];
                if let Some(stored) = &report.stored {
                    lines.push(format!("Stored:    {} ({} entries)", stored.blob, stored.entries));
                }
                lines.push(String::new());
                lines.push(format!("{:<3} {:<12} {:>10}  {}", "#", "ID", "Market", "Name"));
                lines.push(format!("{:-<3} {:-<12} {:->10}  {:-<30}", "", "", "", ""));
                for (i, card) in report.top.iter().enumerate() {
                    lines.push(format!(
                        "{:<3} {:<12} {:>10}  {}",
                        i + 1,
                        card.id,
                        format!("${:.2}", card.market_usd),
                        card.name
                    ));
                }
                lines.join("\n")
            }
        }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    // Scrape formatting

    fn table_scrape(&self, report: &ScrapeReport) -> String {
        let snapshot = &report.snapshot;
        let mut lines = vec![
            format!("Item:      {}", snapshot.card_name),
            format!("Price:     ${:.2}", snapshot.price_usd),
            format!("Timestamp: {}", snapshot.timestamp),
            format!("Strategy:  {}", report.strategy),
            format!("Stored:    {} ({} entries)", report.stored.blob, report.stored.entries),
        ];
        if report.stored.dropped > 0 {
            lines.push(format!("Dropped:   {} oldest", report.stored.dropped));
        }
        lines.join("\n")
    }

    fn markdown_scrape(&self, report: &ScrapeReport) -> String {
        let snapshot = &report.snapshot;
        let lines = [
            format!("## {}", snapshot.card_name),
            String::new(),
            format!("- **Market price:** ${:.2}", snapshot.price_usd),
            format!("- **Timestamp:** {}", snapshot.timestamp),
            format!("- **Found by:** {}", report.strategy),
            format!("- **History:** `{}` ({} entries)", report.stored.blob, report.stored.entries),
        ];
        lines.join("\n")
    }

    fn csv_scrape(&self, report: &ScrapeReport) -> String {
        let snapshot = &report.snapshot;
        let lines = [
            "timestamp,card_name,price_usd,strategy,blob,entries".to_string(),
            format!(
                "{},{},{},{},{},{}",
                snapshot.timestamp,
                Self::csv_escape(&snapshot.card_name),
                snapshot.price_usd,
                report.strategy,
                Self::csv_escape(&report.stored.blob),
                report.stored.entries
            ),
        ];
        lines.join("\n")
    }

    // History formatting

    /// Timestamp and value cells of one entry; card and index histories share the layout.
    fn history_row(entry: &Value) -> (String, String) {
        let timestamp = entry.get("timestamp").and_then(Value::as_str).unwrap_or("").to_string();
        let value = ["price_usd", "index_usd"]
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_f64))
            .map(|v| v.to_string())
            .unwrap_or_default();
        (timestamp, value)
    }

    fn table_history(&self, name: &str, entries: &[Value]) -> String {
        let ts_width = 29;
        let value_width = 10;

        let mut lines = Vec::new();
        lines.push(format!("{:<ts_width$}  {:>value_width$}", "Timestamp", "USD"));
        lines.push(format!("{:-<ts_width$}  {:->value_width$}", "", ""));

        for entry in entries {
            let (timestamp, value) = Self::history_row(entry);
            let value = value
                .parse::<f64>()
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|_| "N/A".to_string());
            lines.push(format!("{:<ts_width$}  {:>value_width$}", timestamp, value));
        }

        lines.push(String::new());
        lines.push(format!("{}: {} entries", name, entries.len()));
        lines.join("\n")
    }

    fn markdown_history(&self, name: &str, entries: &[Value]) -> String {
        let mut lines = vec![
            format!("## {} history", name),
            String::new(),
            "| Timestamp | USD |".to_string(),
            "|-----------|-----|".to_string(),
        ];

        for entry in entries {
            let (timestamp, value) = Self::history_row(entry);
            lines.push(format!("| {} | {} |", timestamp, value));
        }

        lines.push(String::new());
        lines.push(format!("*{} entries*", entries.len()));
        lines.join("\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}
