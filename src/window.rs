//! Session windowing: fixed-width, epoch-aligned time buckets.
//!
//! Each record is tagged with the window containing its timestamp plus its
//! client identity and URL. A (window, client) pair is one session.

use crate::record::LogRecord;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Default session window width in minutes.
pub const DEFAULT_WINDOW_MINUTES: u32 = 15;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl std::fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// A record tagged with its session window and derived attributes.
#[derive(Debug, Clone, Copy)]
pub struct WindowedRecord<'a> {
    pub record: &'a LogRecord,
    pub window: SessionWindow,
    pub client: Option<&'a str>,
    pub url: Option<&'a str>,
}

impl WindowedRecord<'_> {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.create_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    ZeroWidth,
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::ZeroWidth => write!(f, "session window width must be at least 1 minute"),
        }
    }
}

impl std::error::Error for WindowError {}

/// Assigns records to fixed-width windows aligned to the Unix epoch.
#[derive(Debug, Clone, Copy)]
pub struct Windower {
    width_secs: i64,
}

impl Default for Windower {
    fn default() -> Self {
        Self {
            width_secs: DEFAULT_WINDOW_MINUTES as i64 * 60,
        }
    }
}

impl Windower {
    pub fn from_minutes(minutes: u32) -> Result<Self, WindowError> {
        if minutes == 0 {
            return Err(WindowError::ZeroWidth);
        }
        Ok(Self {
            width_secs: minutes as i64 * 60,
        })
    }

    pub fn width(&self) -> TimeDelta {
        TimeDelta::seconds(self.width_secs)
    }

    /// The window containing `ts`.
    ///
    /// The start is `ts` floored to a multiple of the width since the epoch,
    /// so a timestamp exactly on a boundary opens the next window.
    pub fn window_of(&self, ts: DateTime<Utc>) -> SessionWindow {
        let offset = TimeDelta::seconds(ts.timestamp().rem_euclid(self.width_secs))
            + TimeDelta::nanoseconds(ts.timestamp_subsec_nanos() as i64);
        let start = ts - offset;
        let window = SessionWindow {
            start,
            end: start + self.width(),
        };
        debug_assert!(window.contains(ts));
        window
    }

    /// Tag every record with its window, client identity and URL.
    pub fn apply<'a>(&self, records: &'a [LogRecord]) -> Vec<WindowedRecord<'a>> {
        let windowed: Vec<WindowedRecord<'a>> = records
            .iter()
            .map(|record| WindowedRecord {
                record,
                window: self.window_of(record.create_time),
                client: record.client_identity(),
                url: record.url(),
            })
            .collect();
        tracing::debug!(
            records = windowed.len(),
            width_secs = self.width_secs,
            "windowed records"
        );
        windowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 7, 22, h, m, s).unwrap()
    }

    #[test]
    fn window_of_floors_to_quarter_hour() {
        let w = Windower::default().window_of(at(10, 5, 0));
        assert_eq!(w.start, at(10, 0, 0));
        assert_eq!(w.end, at(10, 15, 0));
    }

    #[test]
    fn boundary_belongs_to_window_starting_there() {
        let w = Windower::default().window_of(at(10, 15, 0));
        assert_eq!(w.start, at(10, 15, 0));
        assert_eq!(w.end, at(10, 30, 0));

        let just_before = at(10, 15, 0) - TimeDelta::nanoseconds(1);
        let w = Windower::default().window_of(just_before);
        assert_eq!(w.start, at(10, 0, 0));
    }

    #[test]
    fn sub_second_timestamps_stay_inside() {
        let ts = at(9, 14, 59) + TimeDelta::microseconds(999_999);
        let w = Windower::default().window_of(ts);
        assert_eq!(w.start, at(9, 0, 0));
        assert!(w.contains(ts));
    }

    #[test]
    fn window_contains_and_has_exact_width() {
        let windower = Windower::from_minutes(15).unwrap();
        let mut ts = at(0, 0, 0);
        let step = TimeDelta::seconds(7 * 60 + 13) + TimeDelta::microseconds(4321);
        for _ in 0..500 {
            let w = windower.window_of(ts);
            assert!(w.contains(ts), "{ts} not in {w}");
            assert_eq!(w.end - w.start, TimeDelta::minutes(15));
            ts += step;
        }
    }

    #[test]
    fn pre_epoch_floors_toward_negative_infinity() {
        let ts = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        let w = Windower::default().window_of(ts);
        assert_eq!(w.start, Utc.with_ymd_and_hms(1969, 12, 31, 23, 45, 0).unwrap());
        assert!(w.contains(ts));
    }

    #[test]
    fn custom_width() {
        let w = Windower::from_minutes(60).unwrap().window_of(at(10, 59, 59));
        assert_eq!(w.start, at(10, 0, 0));
        assert_eq!(w.end, at(11, 0, 0));
    }

    #[test]
    fn zero_width_rejected() {
        assert_eq!(Windower::from_minutes(0).unwrap_err(), WindowError::ZeroWidth);
    }

    #[test]
    fn apply_derives_client_and_url() {
        let mut r = LogRecord::at(at(10, 0, 0));
        r.client_host_port = Some("1.2.3.4:80".to_string());
        r.request = Some("GET /a HTTP/1.1".to_string());
        let mut bad = LogRecord::at(at(10, 1, 0));
        bad.client_host_port = Some("nohost".to_string());
        let records = vec![r, bad];

        let windowed = Windower::default().apply(&records);
        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[0].client, Some("1.2.3.4"));
        assert_eq!(windowed[0].url, Some("/a"));
        assert_eq!(windowed[1].client, None);
        assert_eq!(windowed[1].url, None);
        assert_eq!(windowed[0].window, windowed[1].window);
    }

    #[test]
    fn display_is_half_open() {
        let w = Windower::default().window_of(at(10, 0, 0));
        assert_eq!(w.to_string(), "[2015-07-22 10:00:00, 2015-07-22 10:15:00)");
    }
}
