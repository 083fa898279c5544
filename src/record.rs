/// Typed representation of one load-balancer access log line.
///
/// Column order follows the ELB access log format. Only `create_time`,
/// `client_host_port` and `request` feed the session statistics; everything
/// else is carried through so ranked rows can show the full record.
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of columns in a full access log line.
pub const COLUMN_COUNT: usize = 15;

/// One parsed access log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub create_time: DateTime<Utc>,
    pub elb: Option<String>,
    pub client_host_port: Option<String>,
    pub backend_host_port: Option<String>,
    pub request_processing_time: Option<f64>,
    pub backend_processing_time: Option<f64>,
    pub response_processing_time: Option<f64>,
    pub elb_status_code: Option<u16>,
    pub backend_status_code: Option<u16>,
    pub received_bytes: Option<u64>,
    pub sent_bytes: Option<u64>,
    pub request: Option<String>,
    pub user_agent: Option<String>,
    pub ssl_cipher: Option<String>,
    pub ssl_protocol: Option<String>,
}

impl LogRecord {
    /// A record with only a timestamp; every other column absent.
    #[cfg(test)]
    pub fn at(create_time: DateTime<Utc>) -> Self {
        Self {
            create_time,
            elb: None,
            client_host_port: None,
            backend_host_port: None,
            request_processing_time: None,
            backend_processing_time: None,
            response_processing_time: None,
            elb_status_code: None,
            backend_status_code: None,
            received_bytes: None,
            sent_bytes: None,
            request: None,
            user_agent: None,
            ssl_cipher: None,
            ssl_protocol: None,
        }
    }

    /// Client identity: the host part of `client_host_port`.
    pub fn client_identity(&self) -> Option<&str> {
        self.client_host_port.as_deref().and_then(client_identity)
    }

    /// Requested URL: the second token of the request line.
    pub fn url(&self) -> Option<&str> {
        self.request.as_deref().and_then(url_of)
    }

    /// Hashable view of every column, used for whole-row distinctness.
    ///
    /// Floats are compared by bit pattern, so two records are equal here
    /// exactly when they came from identical log lines.
    pub fn fingerprint(&self) -> RecordFingerprint<'_> {
        RecordFingerprint {
            create_time: self.create_time,
            text: [
                self.elb.as_deref(),
                self.client_host_port.as_deref(),
                self.backend_host_port.as_deref(),
                self.request.as_deref(),
                self.user_agent.as_deref(),
                self.ssl_cipher.as_deref(),
                self.ssl_protocol.as_deref(),
            ],
            timings: [
                self.request_processing_time.map(f64::to_bits),
                self.backend_processing_time.map(f64::to_bits),
                self.response_processing_time.map(f64::to_bits),
            ],
            status: [self.elb_status_code, self.backend_status_code],
            bytes: [self.received_bytes, self.sent_bytes],
        }
    }
}

/// See [`LogRecord::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordFingerprint<'a> {
    create_time: DateTime<Utc>,
    text: [Option<&'a str>; 7],
    timings: [Option<u64>; 3],
    status: [Option<u16>; 2],
    bytes: [Option<u64>; 2],
}

/// Extract the host from a `host:port` address.
///
/// Bracketed IPv6 (`[::1]:443`) yields the address inside the brackets.
/// Returns None when there is no port separator or the host is empty.
pub fn client_identity(host_port: &str) -> Option<&str> {
    let host = if let Some(rest) = host_port.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        tail.strip_prefix(':')?;
        host
    } else {
        host_port.split_once(':')?.0
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Extract the URL (second whitespace-delimited token) from a request line.
///
/// ELB writes `- - -` for requests it could not parse; `-` is treated as no URL.
pub fn url_of(request: &str) -> Option<&str> {
    match request.split_whitespace().nth(1) {
        Some("-") | None => None,
        Some(url) => Some(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 7, 22, 9, 0, 0).unwrap()
    }

    #[test]
    fn client_identity_strips_port() {
        assert_eq!(client_identity("1.2.3.4:80"), Some("1.2.3.4"));
        assert_eq!(client_identity("123.242.248.130:54635"), Some("123.242.248.130"));
    }

    #[test]
    fn client_identity_bracketed_ipv6() {
        assert_eq!(client_identity("[2001:db8::1]:443"), Some("2001:db8::1"));
        assert_eq!(client_identity("[2001:db8::1]"), None);
    }

    #[test]
    fn client_identity_rejects_malformed() {
        assert_eq!(client_identity("1.2.3.4"), None);
        assert_eq!(client_identity(":80"), None);
        assert_eq!(client_identity(""), None);
    }

    #[test]
    fn url_is_second_token() {
        assert_eq!(url_of("GET /a HTTP/1.1"), Some("/a"));
        assert_eq!(
            url_of("GET https://paytm.com:443/shop/cart HTTP/1.1"),
            Some("https://paytm.com:443/shop/cart")
        );
    }

    #[test]
    fn url_missing_or_placeholder() {
        assert_eq!(url_of("GET"), None);
        assert_eq!(url_of(""), None);
        assert_eq!(url_of("- - - "), None);
    }

    #[test]
    fn record_accessors_handle_absent_columns() {
        let r = LogRecord::at(ts());
        assert_eq!(r.client_identity(), None);
        assert_eq!(r.url(), None);
    }

    #[test]
    fn fingerprint_equal_for_identical_records() {
        let mut a = LogRecord::at(ts());
        a.client_host_port = Some("1.2.3.4:80".to_string());
        a.request_processing_time = Some(0.000022);
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = a.clone();
        c.request_processing_time = Some(0.000023);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
