/// Runs the windower once and all four statistics over the shared result.
use crate::aggregate::{self, RankedRow, RankingDedup, SessionHits, UrlHits};
use crate::record::LogRecord;
use crate::window::Windower;
use serde::Serialize;

/// Record counts behind a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub records: usize,
    pub without_client: usize,
    pub without_url: usize,
    pub sessions: usize,
}

/// All four statistics for one input.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub window_minutes: i64,
    pub summary: Summary,
    pub hits_per_session: Vec<SessionHits<'a>>,
    pub average_session_secs: Option<f64>,
    pub unique_url_hits: Vec<UrlHits<'a>>,
    pub longest_sessions: Vec<RankedRow<'a>>,
}

impl<'a> Report<'a> {
    pub fn build(records: &'a [LogRecord], windower: &Windower, dedup: RankingDedup) -> Self {
        let windowed = windower.apply(records);

        let without_client = windowed.iter().filter(|r| r.client.is_none()).count();
        let without_url = windowed
            .iter()
            .filter(|r| r.client.is_some() && r.url.is_none())
            .count();
        if without_client > 0 || without_url > 0 {
            tracing::debug!(
                without_client,
                without_url,
                "records excluded from some statistics"
            );
        }

        let stats = aggregate::session_stats(&windowed);
        let report = Report {
            window_minutes: windower.width().num_minutes(),
            summary: Summary {
                records: windowed.len(),
                without_client,
                without_url,
                sessions: stats.len(),
            },
            hits_per_session: aggregate::hits_per_session(&windowed),
            average_session_secs: aggregate::average_session_duration(&stats),
            unique_url_hits: aggregate::unique_url_hits(&windowed),
            longest_sessions: aggregate::longest_sessions(&windowed, &stats, dedup),
        };

        tracing::info!(
            records = report.summary.records,
            sessions = report.summary.sessions,
            average_session_secs = ?report.average_session_secs,
            "computed session statistics"
        );
        report
    }
}
