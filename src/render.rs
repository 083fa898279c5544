//! Report rendering: bordered text tables or JSON.
//!
//! Text tables mimic a dataframe `show()`: `+---+` rules, left-aligned cells,
//! and an `only showing top N rows` footer when the display limit cuts rows.

use crate::report::Report;
use serde::{Deserialize, Serialize};

/// Default number of rows shown per table.
pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// A text table ready for rendering.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Render at most `limit` rows (0 = all).
    pub fn render(&self, limit: usize) -> String {
        let shown = if limit == 0 {
            self.rows.len()
        } else {
            limit.min(self.rows.len())
        };
        let rows = &self.rows[..shown];

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let rule = {
            let mut s = String::from("+");
            for w in &widths {
                s.push_str(&"-".repeat(*w));
                s.push('+');
            }
            s
        };
        let line = |cells: &[String]| {
            let mut s = String::from("|");
            for (i, w) in widths.iter().enumerate() {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                s.push_str(cell);
                s.push_str(&" ".repeat(w - cell.chars().count()));
                s.push('|');
            }
            s
        };

        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&line(&self.headers));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
        for row in rows {
            out.push_str(&line(row));
            out.push('\n');
        }
        out.push_str(&rule);
        out.push('\n');
        if shown < self.rows.len() {
            out.push_str(&format!(
                "only showing top {shown} {}\n",
                if shown == 1 { "row" } else { "rows" }
            ));
        }
        out
    }
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map_or_else(|| "null".to_string(), ToString::to_string)
}

fn secs(v: f64) -> String {
    format!("{v:.3}")
}

/// Render all four statistics as text tables.
pub fn render_tables(report: &Report<'_>, limit: usize) -> String {
    let mut out = String::new();

    out.push_str("Hits per session\n");
    let mut t = Table::new(["interval", "client_host", "num_hits_ip"]);
    for h in &report.hits_per_session {
        t.push(vec![h.window.to_string(), h.client.to_string(), h.hits.to_string()]);
    }
    out.push_str(&t.render(limit));
    out.push('\n');

    out.push_str("Average session duration\n");
    let mut t = Table::new(["avg(session_duration)"]);
    t.push(vec![opt(&report.average_session_secs.map(secs))]);
    out.push_str(&t.render(limit));
    out.push('\n');

    out.push_str("Unique URL hits\n");
    let mut t = Table::new(["client_host", "interval", "url", "unique_url_hits"]);
    for u in &report.unique_url_hits {
        t.push(vec![
            u.client.to_string(),
            u.window.to_string(),
            u.url.to_string(),
            u.hits.to_string(),
        ]);
    }
    out.push_str(&t.render(limit));
    out.push('\n');

    out.push_str("Longest sessions\n");
    let mut t = Table::new([
        "interval",
        "client_host",
        "create_time",
        "elb",
        "client_host_port",
        "backend_host_port",
        "request_processing_time",
        "backend_processing_time",
        "response_processing_time",
        "elb_status_code",
        "backend_status_code",
        "received_bytes",
        "sent_bytes",
        "request",
        "user_agent",
        "ssl_cipher",
        "ssl_protocol",
        "url",
        "session_duration",
    ]);
    for row in &report.longest_sessions {
        let r = row.record;
        t.push(vec![
            row.window.to_string(),
            row.client.to_string(),
            r.create_time.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            opt(&r.elb),
            opt(&r.client_host_port),
            opt(&r.backend_host_port),
            opt(&r.request_processing_time),
            opt(&r.backend_processing_time),
            opt(&r.response_processing_time),
            opt(&r.elb_status_code),
            opt(&r.backend_status_code),
            opt(&r.received_bytes),
            opt(&r.sent_bytes),
            opt(&r.request),
            opt(&r.user_agent),
            opt(&r.ssl_cipher),
            opt(&r.ssl_protocol),
            row.url.to_string(),
            secs(row.session_duration_secs),
        ]);
    }
    out.push_str(&t.render(limit));

    out
}

/// Render the whole report, untruncated, as pretty JSON.
pub fn render_json(report: &Report<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
