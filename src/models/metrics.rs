//! Measurement data model: one timed HTTP exchange

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use chrono::{DateTime, Utc};

/// Response code recorded when an attempt failed before a status was seen
pub const RESPONSE_CODE_FAILED: i32 = -1;

/// Convert a duration to fractional milliseconds
pub fn msec(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Phase timings and response details of one completed fetch attempt
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Wall clock time the attempt began
    pub start: DateTime<Utc>,

    /// DNS lookup
    pub dns_lookup: Duration,

    /// TCP handshake
    pub tcp_handshake: Duration,

    /// TLS handshake, zero for plain HTTP
    pub tls_handshake: Duration,

    /// Request written until the response head arrived
    pub first_byte: Duration,

    /// Response head until the body was drained and the connection closed
    pub last_byte: Duration,

    /// Sum of the phases unless set explicitly, memoized on first read
    total: OnceLock<Duration>,

    destination: String,

    /// Configured location label, if any
    pub location: Option<String>,

    /// Server IP from DNS resolution, empty if resolution never happened
    pub remote_address: String,

    /// HTTP status code or [`RESPONSE_CODE_FAILED`]
    pub response_code: i32,

    /// Bytes drained from the response body
    pub body_bytes: u64,
}

impl Measurement {
    /// Start an empty measurement for `destination`
    pub fn new(destination: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            start,
            dns_lookup: Duration::ZERO,
            tcp_handshake: Duration::ZERO,
            tls_handshake: Duration::ZERO,
            first_byte: Duration::ZERO,
            last_byte: Duration::ZERO,
            total: OnceLock::new(),
            destination: destination.into(),
            location: None,
            remote_address: String::new(),
            response_code: RESPONSE_CODE_FAILED,
            body_bytes: 0,
        }
    }

    /// Set the location label
    pub fn with_location(mut self, location: Option<&str>) -> Self {
        self.location = location.filter(|l| !l.is_empty()).map(String::from);
        self
    }

    /// Set all five phase durations at once
    pub fn with_phases(
        mut self,
        dns_lookup: Duration,
        tcp_handshake: Duration,
        tls_handshake: Duration,
        first_byte: Duration,
        last_byte: Duration,
    ) -> Self {
        self.dns_lookup = dns_lookup;
        self.tcp_handshake = tcp_handshake;
        self.tls_handshake = tls_handshake;
        self.first_byte = first_byte;
        self.last_byte = last_byte;
        self
    }

    /// Inject a pre-known total instead of the phase sum
    pub fn with_total(self, total: Duration) -> Self {
        // a fresh OnceLock cannot already be set by anyone else
        let _ = self.total.set(total);
        self
    }

    /// Set the response details
    pub fn with_response(mut self, response_code: i32, body_bytes: u64) -> Self {
        self.response_code = response_code;
        self.body_bytes = body_bytes;
        self
    }

    /// Set the resolved server address
    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = remote_address.into();
        self
    }

    /// Sum of the five phase durations
    pub fn phase_sum(&self) -> Duration {
        self.dns_lookup + self.tcp_handshake + self.tls_handshake + self.first_byte + self.last_byte
    }

    /// Total response time; computed once from the phases unless preset
    pub fn total(&self) -> Duration {
        *self.total.get_or_init(|| self.phase_sum())
    }

    /// Normalized target URL this measurement was taken against
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Location label, or `fallback` when none is configured
    pub fn location_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.location.as_deref().unwrap_or(fallback)
    }

    /// Unix timestamp (seconds) of the start of the attempt
    pub fn start_unix(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn dns_ms(&self) -> f64 {
        msec(self.dns_lookup)
    }

    pub fn tcp_ms(&self) -> f64 {
        msec(self.tcp_handshake)
    }

    pub fn tls_ms(&self) -> f64 {
        msec(self.tls_handshake)
    }

    pub fn first_byte_ms(&self) -> f64 {
        msec(self.first_byte)
    }

    pub fn last_byte_ms(&self) -> f64 {
        msec(self.last_byte)
    }

    pub fn total_ms(&self) -> f64 {
        msec(self.total())
    }

    /// Response code as published to metrics: `%03d`, or `"0"` for the failure sentinel
    pub fn response_code_label(&self) -> String {
        if self.response_code >= 0 {
            format!("{:03}", self.response_code)
        } else {
            "0".to_string()
        }
    }

    /// Structured form for JSON output and the webhook
    pub fn to_record(&self, fallback_location: &str) -> MeasurementRecord {
        MeasurementRecord {
            start: self.start,
            start_unix: self.start_unix(),
            dns_lookup_ns: self.dns_lookup.as_nanos() as u64,
            tcp_handshake_ns: self.tcp_handshake.as_nanos() as u64,
            tls_handshake_ns: self.tls_handshake.as_nanos() as u64,
            first_byte_ns: self.first_byte.as_nanos() as u64,
            last_byte_ns: self.last_byte.as_nanos() as u64,
            total_ns: self.total().as_nanos() as u64,
            dns_lookup_ms: self.dns_ms(),
            tcp_handshake_ms: self.tcp_ms(),
            tls_handshake_ms: self.tls_ms(),
            first_byte_ms: self.first_byte_ms(),
            last_byte_ms: self.last_byte_ms(),
            total_ms: self.total_ms(),
            destination: self.destination.clone(),
            location: self.location_or(fallback_location).to_string(),
            remote_address: self.remote_address.clone(),
            response_code: self.response_code,
            body_bytes: self.body_bytes,
        }
    }
}

/// Serialized measurement with raw nanosecond and millisecond values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub start: DateTime<Utc>,
    pub start_unix: i64,
    pub dns_lookup_ns: u64,
    pub tcp_handshake_ns: u64,
    pub tls_handshake_ns: u64,
    pub first_byte_ns: u64,
    pub last_byte_ns: u64,
    pub total_ns: u64,
    pub dns_lookup_ms: f64,
    pub tcp_handshake_ms: f64,
    pub tls_handshake_ms: f64,
    pub first_byte_ms: f64,
    pub last_byte_ms: f64,
    pub total_ms: f64,
    pub destination: String,
    pub location: String,
    pub remote_address: String,
    pub response_code: i32,
    pub body_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Measurement {
        Measurement::new("https://example.com/", Utc::now())
            .with_phases(
                Duration::from_micros(1_500),
                Duration::from_micros(20_250),
                Duration::from_micros(30_000),
                Duration::from_micros(100_001),
                Duration::from_micros(2_000),
            )
            .with_response(200, 1256)
            .with_remote_address("93.184.216.34")
    }

    #[test]
    fn test_new_measurement_is_empty() {
        let m = Measurement::new("http://example.com/", Utc::now());
        assert_eq!(m.total(), Duration::ZERO);
        assert_eq!(m.response_code, RESPONSE_CODE_FAILED);
        assert_eq!(m.body_bytes, 0);
        assert!(m.remote_address.is_empty());
        assert_eq!(m.destination(), "http://example.com/");
    }

    #[test]
    fn test_total_is_phase_sum() {
        let m = sample();
        assert_eq!(m.total(), Duration::from_micros(153_751));
        assert!((m.total_ms() - 153.751).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_total_wins() {
        let m = sample().with_total(Duration::from_millis(999));
        assert_eq!(m.total(), Duration::from_millis(999));
        assert_ne!(m.total(), m.phase_sum());
    }

    #[test]
    fn test_total_is_memoized() {
        let mut m = sample();
        let first = m.total();
        m.last_byte += Duration::from_secs(1);
        assert_eq!(m.total(), first);
    }

    #[test]
    fn test_location_fallback() {
        let m = sample();
        assert_eq!(m.location_or("10.0.0.5"), "10.0.0.5");

        let m = sample().with_location(Some("Paris,FR"));
        assert_eq!(m.location_or("10.0.0.5"), "Paris,FR");

        let m = sample().with_location(Some(""));
        assert_eq!(m.location, None);
    }

    #[test]
    fn test_response_code_label() {
        assert_eq!(sample().response_code_label(), "200");
        assert_eq!(sample().with_response(0, 0).response_code_label(), "000");
        assert_eq!(sample().with_response(RESPONSE_CODE_FAILED, 0).response_code_label(), "0");
    }

    #[test]
    fn test_record_carries_nanoseconds() {
        let record = sample().to_record("here");
        assert_eq!(record.dns_lookup_ns, 1_500_000);
        assert_eq!(record.total_ns, 153_751_000);
        assert_eq!(record.location, "here");
        assert_eq!(record.response_code, 200);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tcp_handshake_ns"], 20_250_000u64);
        assert_eq!(json["destination"], "https://example.com/");
    }

    proptest! {
        #[test]
        fn prop_total_equals_sum_of_phases(
            dns in 0u64..5_000_000_000,
            tcp in 0u64..5_000_000_000,
            tls in 0u64..5_000_000_000,
            first in 0u64..5_000_000_000,
            last in 0u64..5_000_000_000,
        ) {
            let m = Measurement::new("http://x/", Utc::now()).with_phases(
                Duration::from_nanos(dns),
                Duration::from_nanos(tcp),
                Duration::from_nanos(tls),
                Duration::from_nanos(first),
                Duration::from_nanos(last),
            );
            prop_assert_eq!(m.total().as_nanos() as u64, dns + tcp + tls + first + last);
        }
    }
}
