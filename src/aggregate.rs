//! The four session statistics.
//!
//! Every function here is a pure function of a windowed record slice.
//! Grouping uses a key → index map into an output Vec so results come out
//! in order of first appearance in the input.

use crate::record::{LogRecord, RecordFingerprint};
use crate::window::{SessionWindow, WindowedRecord};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Hit count for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHits<'a> {
    pub window: SessionWindow,
    pub client: &'a str,
    pub hits: u64,
}

/// Per-session intermediate: hit count and first/last hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats<'a> {
    pub window: SessionWindow,
    pub client: &'a str,
    pub hits: u64,
    pub first_hit: DateTime<Utc>,
    pub last_hit: DateTime<Utc>,
}

impl SessionStats<'_> {
    pub fn duration(&self) -> TimeDelta {
        self.last_hit - self.first_hit
    }

    pub fn duration_secs(&self) -> f64 {
        delta_secs(self.duration())
    }
}

/// Hits on one URL within one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlHits<'a> {
    pub client: &'a str,
    pub window: SessionWindow,
    pub url: &'a str,
    pub hits: u64,
}

/// One row of the longest-session ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow<'a> {
    pub window: SessionWindow,
    pub client: &'a str,
    pub url: &'a str,
    pub session_duration_secs: f64,
    pub record: &'a LogRecord,
    #[serde(skip)]
    duration: TimeDelta,
}

/// Deduplication applied to the longest-session ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankingDedup {
    /// Collapse rows that are identical in every column.
    #[default]
    Row,
    /// Keep one row per (window, client).
    Session,
}

type SessionKey<'a> = (SessionWindow, &'a str);

fn delta_secs(d: TimeDelta) -> f64 {
    d.num_seconds() as f64 + d.subsec_nanos() as f64 / 1e9
}

/// (a) Count records per (window, client).
pub fn hits_per_session<'a>(records: &[WindowedRecord<'a>]) -> Vec<SessionHits<'a>> {
    let mut index: HashMap<SessionKey<'a>, usize> = HashMap::new();
    let mut out: Vec<SessionHits<'a>> = Vec::new();

    for r in records {
        let Some(client) = r.client else { continue };
        match index.get(&(r.window, client)) {
            Some(&i) => out[i].hits += 1,
            None => {
                index.insert((r.window, client), out.len());
                out.push(SessionHits {
                    window: r.window,
                    client,
                    hits: 1,
                });
            }
        }
    }

    out
}

/// Per-session first/last hit, the input to (b) and (d).
pub fn session_stats<'a>(records: &[WindowedRecord<'a>]) -> Vec<SessionStats<'a>> {
    let mut index: HashMap<SessionKey<'a>, usize> = HashMap::new();
    let mut out: Vec<SessionStats<'a>> = Vec::new();

    for r in records {
        let Some(client) = r.client else { continue };
        let ts = r.timestamp();
        match index.get(&(r.window, client)) {
            Some(&i) => {
                let s = &mut out[i];
                s.hits += 1;
                s.first_hit = s.first_hit.min(ts);
                s.last_hit = s.last_hit.max(ts);
            }
            None => {
                index.insert((r.window, client), out.len());
                out.push(SessionStats {
                    window: r.window,
                    client,
                    hits: 1,
                    first_hit: ts,
                    last_hit: ts,
                });
            }
        }
    }

    out
}

/// (b) Mean session duration in seconds, or None when there are no sessions.
///
/// Every session counts once; a single-hit session contributes zero.
pub fn average_session_duration(stats: &[SessionStats<'_>]) -> Option<f64> {
    if stats.is_empty() {
        return None;
    }
    let total: f64 = stats.iter().map(SessionStats::duration_secs).sum();
    Some(total / stats.len() as f64)
}

/// (c) Count records per (client, window, url).
pub fn unique_url_hits<'a>(records: &[WindowedRecord<'a>]) -> Vec<UrlHits<'a>> {
    let mut index: HashMap<(&'a str, SessionWindow, &'a str), usize> = HashMap::new();
    let mut out: Vec<UrlHits<'a>> = Vec::new();

    for r in records {
        let (Some(client), Some(url)) = (r.client, r.url) else {
            continue;
        };
        match index.get(&(client, r.window, url)) {
            Some(&i) => out[i].hits += 1,
            None => {
                index.insert((client, r.window, url), out.len());
                out.push(UrlHits {
                    client,
                    window: r.window,
                    url,
                    hits: 1,
                });
            }
        }
    }

    out
}

/// (d) Records joined with their session's duration, longest first.
///
/// Sorting is stable, so equal durations keep input order. Records without
/// a client or URL are left out.
pub fn longest_sessions<'a>(
    records: &[WindowedRecord<'a>],
    stats: &[SessionStats<'a>],
    dedup: RankingDedup,
) -> Vec<RankedRow<'a>> {
    let durations: HashMap<SessionKey<'a>, TimeDelta> = stats
        .iter()
        .map(|s| ((s.window, s.client), s.duration()))
        .collect();

    let mut rows: Vec<RankedRow<'a>> = records
        .iter()
        .filter_map(|r| {
            let client = r.client?;
            let url = r.url?;
            let duration = *durations.get(&(r.window, client))?;
            Some(RankedRow {
                window: r.window,
                client,
                url,
                session_duration_secs: delta_secs(duration),
                record: r.record,
                duration,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.duration.cmp(&a.duration));

    let before = rows.len();
    match dedup {
        RankingDedup::Row => {
            // Window, client and url derive from the record, so the
            // record's columns decide distinctness.
            let mut seen: HashSet<RecordFingerprint<'a>> = HashSet::new();
            rows.retain(|row| seen.insert(row.record.fingerprint()));
        }
        RankingDedup::Session => {
            let mut seen: HashSet<SessionKey<'a>> = HashSet::new();
            rows.retain(|row| seen.insert((row.window, row.client)));
        }
    }
    tracing::debug!(
        rows = rows.len(),
        collapsed = before - rows.len(),
        dedup = ?dedup,
        "ranked sessions"
    );

    rows
}
