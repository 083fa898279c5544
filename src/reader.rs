//! Access log reader: open (and decompress) the input, split each line into
//! columns, and parse them into [`LogRecord`]s.
//!
//! Malformed columns become `None`. A line whose timestamp cannot be parsed
//! is dropped and counted in [`ReadStats`]; it never aborts the read.

use crate::record::{LogRecord, COLUMN_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compression of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Pick based on the file extension.
    #[default]
    Auto,
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Resolve `Auto` against a path's extension.
    pub fn resolve(self, path: &Path) -> Compression {
        if self != Compression::Auto {
            return self;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("zst") | Some("zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }
}

/// Reader options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub compression: Compression,
    /// Skip the first non-blank line.
    pub has_header: bool,
}

/// Counters collected while reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub lines: u64,
    pub records: u64,
    pub blank_lines: u64,
    pub bad_timestamps: u64,
}

/// Errors from reading the input.
#[derive(Debug)]
pub enum ReadError {
    /// The input does not exist or can't be opened.
    InputUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Reading or decompressing failed part way through.
    Io { source: std::io::Error },
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::InputUnavailable { path, source } => {
                write!(f, "input unavailable: {}: {source}", path.display())
            }
            ReadError::Io { source } => write!(f, "failed to read input: {source}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::InputUnavailable { source, .. } => Some(source),
            ReadError::Io { source } => Some(source),
        }
    }
}

/// Why a single line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    MissingTimestamp,
    BadTimestamp(String),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::MissingTimestamp => write!(f, "missing timestamp"),
            LineError::BadTimestamp(raw) => write!(f, "unparseable timestamp {raw:?}"),
        }
    }
}

impl std::error::Error for LineError {}

/// Open `path` and read every record from it.
pub fn read_path(
    path: &Path,
    opts: ReadOptions,
) -> Result<(Vec<LogRecord>, ReadStats), ReadError> {
    let file = std::fs::File::open(path).map_err(|e| ReadError::InputUnavailable {
        path: path.to_path_buf(),
        source: e,
    })?;
    let compression = opts.compression.resolve(path);
    tracing::info!(
        path = %path.display(),
        compression = ?compression,
        "reading access log"
    );

    let input: Box<dyn Read> = match compression {
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(file)),
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(file).map_err(|e| ReadError::Io { source: e })?,
        ),
        Compression::None | Compression::Auto => Box::new(file),
    };

    read_from(BufReader::new(input), opts.has_header)
}

/// Read every record from an already-open, already-decompressed stream.
pub fn read_from<R: BufRead>(
    mut reader: R,
    has_header: bool,
) -> Result<(Vec<LogRecord>, ReadStats), ReadError> {
    let mut records = Vec::new();
    let mut stats = ReadStats::default();
    let mut skip_header = has_header;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ReadError::Io { source: e })?;
        if n == 0 {
            break;
        }
        stats.lines += 1;

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            stats.blank_lines += 1;
            continue;
        }
        if skip_header {
            skip_header = false;
            continue;
        }

        match parse_line(line) {
            Ok(record) => {
                stats.records += 1;
                records.push(record);
            }
            Err(e) => {
                stats.bad_timestamps += 1;
                tracing::debug!(line = stats.lines, error = %e, "dropping record");
            }
        }
    }

    if stats.bad_timestamps > 0 {
        tracing::warn!(
            dropped = stats.bad_timestamps,
            "dropped records with unparseable timestamps"
        );
    }
    tracing::info!(
        lines = stats.lines,
        records = stats.records,
        "finished reading access log"
    );

    Ok((records, stats))
}

/// Parse one log line into a record.
pub fn parse_line(line: &str) -> Result<LogRecord, LineError> {
    let fields = split_fields(line);
    let col = |i: usize| -> Option<&str> {
        fields
            .get(i)
            .map(String::as_str)
            .filter(|s| !s.is_empty() && *s != "-")
    };

    let raw_time = col(0).ok_or(LineError::MissingTimestamp)?;
    let create_time = parse_timestamp(raw_time)
        .ok_or_else(|| LineError::BadTimestamp(raw_time.to_string()))?;

    if fields.len() < COLUMN_COUNT {
        tracing::trace!(columns = fields.len(), "short record; trailing columns absent");
    }

    Ok(LogRecord {
        create_time,
        elb: col(1).map(str::to_string),
        client_host_port: col(2).map(str::to_string),
        backend_host_port: col(3).map(str::to_string),
        request_processing_time: col(4).and_then(parse_num),
        backend_processing_time: col(5).and_then(parse_num),
        response_processing_time: col(6).and_then(parse_num),
        elb_status_code: col(7).and_then(parse_num),
        backend_status_code: col(8).and_then(parse_num),
        received_bytes: col(9).and_then(parse_num),
        sent_bytes: col(10).and_then(parse_num),
        // The request column keeps "-" so the URL extractor sees the raw line.
        request: fields.get(11).filter(|s| !s.is_empty()).cloned(),
        user_agent: col(12).map(str::to_string),
        ssl_cipher: col(13).map(str::to_string),
        ssl_protocol: col(14).map(str::to_string),
    })
}

fn parse_num<T: FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

/// Parse an RFC 3339 timestamp (`2015-07-22T09:00:28.019143Z`) into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Split a line on spaces, honoring double-quoted fields.
///
/// Inside quotes, `""` and `\"` are literal quotes. Runs of unquoted spaces
/// separate fields; a quoted empty string is an empty field.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut field = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => break,
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    _ => field.push(c),
                }
            }
            // Anything glued to the closing quote belongs to this field.
            while let Some(&c) = chars.peek() {
                if c.is_ascii_whitespace() {
                    break;
                }
                field.push(c);
                chars.next();
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_ascii_whitespace() {
                    break;
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);
    }

    fields
}
