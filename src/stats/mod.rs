//! Running aggregates for one target

use crate::models::{metrics::msec, Measurement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-target running sums, owned by one scheduler
#[derive(Debug, Clone, Default)]
pub struct RunningSummary {
    count: u64,
    dns_lookup: Duration,
    tcp_handshake: Duration,
    tls_handshake: Duration,
    first_byte: Duration,
    last_byte: Duration,
    total: Duration,
    min_total: Option<Duration>,
    max_total: Option<Duration>,
    body_bytes: u64,
    first_start: Option<DateTime<Utc>>,
    destination: Option<String>,
}

/// Averages over every successful measurement of a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub count: u64,
    /// `now - first start`, formatted by [`hhmmss`]
    pub elapsed: String,
    pub elapsed_seconds: i64,
    pub avg_dns_ms: f64,
    pub avg_tcp_ms: f64,
    pub avg_tls_ms: f64,
    pub avg_first_byte_ms: f64,
    pub avg_last_byte_ms: f64,
    pub avg_total_ms: f64,
    pub min_total_ms: f64,
    pub max_total_ms: f64,
    pub avg_body_bytes: u64,
    pub destination: String,
}

impl RunningSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one successful measurement; the first one seeds the start time
    pub fn record(&mut self, measurement: &Measurement) {
        if self.count == 0 {
            self.first_start = Some(measurement.start);
            self.destination = Some(measurement.destination().to_string());
        }

        let total = measurement.total();
        self.count += 1;
        self.dns_lookup += measurement.dns_lookup;
        self.tcp_handshake += measurement.tcp_handshake;
        self.tls_handshake += measurement.tls_handshake;
        self.first_byte += measurement.first_byte;
        self.last_byte += measurement.last_byte;
        self.total += total;
        self.body_bytes += measurement.body_bytes;
        self.min_total = Some(self.min_total.map_or(total, |m| m.min(total)));
        self.max_total = Some(self.max_total.map_or(total, |m| m.max(total)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn first_start(&self) -> Option<DateTime<Utc>> {
        self.first_start
    }

    /// Render the averages as of `now`; `None` when nothing was recorded
    pub fn report(&self, now: DateTime<Utc>) -> Option<SummaryReport> {
        let first_start = self.first_start?;
        if self.count == 0 {
            return None;
        }

        let n = self.count as f64;
        let elapsed_seconds = (now - first_start).num_seconds().max(0);

        Some(SummaryReport {
            count: self.count,
            elapsed: hhmmss(elapsed_seconds),
            elapsed_seconds,
            avg_dns_ms: msec(self.dns_lookup) / n,
            avg_tcp_ms: msec(self.tcp_handshake) / n,
            avg_tls_ms: msec(self.tls_handshake) / n,
            avg_first_byte_ms: msec(self.first_byte) / n,
            avg_last_byte_ms: msec(self.last_byte) / n,
            avg_total_ms: msec(self.total) / n,
            min_total_ms: self.min_total.map(msec).unwrap_or_default(),
            max_total_ms: self.max_total.map(msec).unwrap_or_default(),
            avg_body_bytes: self.body_bytes / self.count,
            destination: self.destination.clone().unwrap_or_default(),
        })
    }
}

/// Format whole seconds as `XhYYmZZs`, `YmZZs` or `Zs`
pub fn hhmmss(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn measurement(start_secs: i64, total_ms: u64, size: u64) -> Measurement {
        let start = Utc.timestamp_opt(start_secs, 0).unwrap();
        Measurement::new("https://example.com/", start)
            .with_phases(
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(3),
                Duration::from_millis(total_ms - 7),
                Duration::from_millis(1),
            )
            .with_response(200, size)
    }

    #[test]
    fn test_empty_summary_has_no_report() {
        let summary = RunningSummary::new();
        assert!(summary.is_empty());
        assert!(summary.report(Utc::now()).is_none());
    }

    #[test]
    fn test_averages() {
        let mut summary = RunningSummary::new();
        summary.record(&measurement(1_000, 100, 1000));
        summary.record(&measurement(1_010, 200, 2000));
        summary.record(&measurement(1_020, 300, 3001));

        let report = summary.report(Utc.timestamp_opt(1_095, 0).unwrap()).unwrap();
        assert_eq!(report.count, 3);
        assert_eq!(report.elapsed, "1m35s");
        assert!((report.avg_total_ms - 200.0).abs() < 1e-9);
        assert!((report.avg_dns_ms - 1.0).abs() < 1e-9);
        assert!((report.min_total_ms - 100.0).abs() < 1e-9);
        assert!((report.max_total_ms - 300.0).abs() < 1e-9);
        assert_eq!(report.avg_body_bytes, 2000);
        assert_eq!(report.destination, "https://example.com/");
    }

    #[test]
    fn test_first_success_seeds_start() {
        let mut summary = RunningSummary::new();
        summary.record(&measurement(50, 10, 0));
        summary.record(&measurement(40, 10, 0));
        assert_eq!(summary.first_start().unwrap().timestamp(), 50);
    }

    #[test]
    fn test_hhmmss() {
        assert_eq!(hhmmss(0), "0s");
        assert_eq!(hhmmss(59), "59s");
        assert_eq!(hhmmss(60), "1m00s");
        assert_eq!(hhmmss(3599), "59m59s");
        assert_eq!(hhmmss(3600), "1h00m00s");
        assert_eq!(hhmmss(90_061), "25h01m01s");
    }

    proptest! {
        #[test]
        fn prop_average_is_sum_over_count(totals in prop::collection::vec(8u64..100_000, 1..50)) {
            let mut summary = RunningSummary::new();
            for (i, total) in totals.iter().enumerate() {
                summary.record(&measurement(i as i64, *total, 0));
            }
            let report = summary.report(Utc::now()).unwrap();
            let expected = totals.iter().sum::<u64>() as f64 / totals.len() as f64;
            prop_assert_eq!(format!("{:.3}", report.avg_total_ms), format!("{:.3}", expected));
        }
    }
}
