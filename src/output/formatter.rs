//! Line formats for measurements and summaries
//!
//! Text output is tab separated with millisecond values to three decimals.
//! JSON output is one pretty-printed record per measurement.

use crate::{
    error::Result,
    models::Measurement,
    stats::SummaryReport,
};

/// Column names of the text format, in row order
pub const COLUMNS: [&str; 12] = [
    "timestamp",
    "DNS",
    "TCP",
    "TLS",
    "First",
    "LastB",
    "Total",
    "HTTP",
    "Size",
    "From_Location",
    "Remote_Addr",
    "proto://uri",
];

/// Notice printed for a target that stopped without a single success
pub const NO_SAMPLES_NOTICE: &str = "No valid samples received, no summary provided";

/// Renders report lines for one output format
pub trait OutputFormatter: Send + Sync {
    /// Header line, if the format has one
    fn format_header(&self) -> Option<String>;

    /// One measurement, without a trailing newline
    fn format_measurement(&self, measurement: &Measurement, fallback_location: &str) -> Result<String>;

    /// Summary block for a stopped target
    fn format_summary(&self, report: &SummaryReport) -> Result<String>;

    fn format_no_samples(&self) -> String {
        NO_SAMPLES_NOTICE.to_string()
    }
}

/// Tab separated text
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvFormatter;

/// Pretty-printed JSON records
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

/// `# timestamp\tDNS\t...` header line
pub fn tsv_header() -> String {
    format!("# {}", COLUMNS.join("\t"))
}

impl OutputFormatter for TsvFormatter {
    fn format_header(&self) -> Option<String> {
        Some(tsv_header())
    }

    fn format_measurement(&self, m: &Measurement, fallback_location: &str) -> Result<String> {
        Ok(format!(
            "{}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:03}\t{}\t{}\t{}\t{}",
            m.start_unix(),
            m.dns_ms(),
            m.tcp_ms(),
            m.tls_ms(),
            m.first_byte_ms(),
            m.last_byte_ms(),
            m.total_ms(),
            m.response_code,
            m.body_bytes,
            m.location_or(fallback_location),
            m.remote_address,
            m.destination(),
        ))
    }

    fn format_summary(&self, r: &SummaryReport) -> Result<String> {
        // count and elapsed take the timestamp column; code and location stay empty
        Ok(format!(
            "\nRecorded {} samples in {}, average values:\n{}\n{} {:<6}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t\t{}\t\t\t{}\n",
            r.count,
            r.elapsed,
            tsv_header(),
            r.count,
            r.elapsed,
            r.avg_dns_ms,
            r.avg_tcp_ms,
            r.avg_tls_ms,
            r.avg_first_byte_ms,
            r.avg_last_byte_ms,
            r.avg_total_ms,
            r.avg_body_bytes,
            r.destination,
        ))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_header(&self) -> Option<String> {
        None
    }

    fn format_measurement(&self, m: &Measurement, fallback_location: &str) -> Result<String> {
        Ok(serde_json::to_string_pretty(&m.to_record(fallback_location))?)
    }

    fn format_summary(&self, report: &SummaryReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(&serde_json::json!({ "summary": report }))?)
    }

    fn format_no_samples(&self) -> String {
        format!("{:#}", serde_json::json!({ "summary": null, "notice": NO_SAMPLES_NOTICE }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn measurement() -> Measurement {
        Measurement::new("https://example.com/", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_phases(
                Duration::from_micros(1_234),
                Duration::from_micros(10_000),
                Duration::from_micros(20_500),
                Duration::from_micros(80_001),
                Duration::from_micros(999),
            )
            .with_response(200, 512)
            .with_remote_address("93.184.216.34")
    }

    fn report() -> SummaryReport {
        SummaryReport {
            count: 3,
            elapsed: "20s".to_string(),
            elapsed_seconds: 20,
            avg_dns_ms: 1.0,
            avg_tcp_ms: 2.0,
            avg_tls_ms: 3.0,
            avg_first_byte_ms: 4.0,
            avg_last_byte_ms: 5.0,
            avg_total_ms: 15.0,
            min_total_ms: 10.0,
            max_total_ms: 20.0,
            avg_body_bytes: 100,
            destination: "https://example.com/".to_string(),
        }
    }

    #[test]
    fn test_header() {
        let header = tsv_header();
        assert!(header.starts_with("# timestamp\tDNS\tTCP\tTLS\tFirst\tLastB\tTotal"));
        assert!(header.ends_with("From_Location\tRemote_Addr\tproto://uri"));
        assert!(JsonFormatter.format_header().is_none());
    }

    #[test]
    fn test_tsv_row() {
        let row = TsvFormatter.format_measurement(&measurement(), "Paris").unwrap();
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields.len(), COLUMNS.len());
        assert_eq!(
            fields,
            vec![
                "1700000000", "1.234", "10.000", "20.500", "80.001", "0.999", "112.734",
                "200", "512", "Paris", "93.184.216.34", "https://example.com/",
            ]
        );
    }

    #[test]
    fn test_tsv_row_pads_response_code() {
        let m = measurement().with_response(0, 0);
        let row = TsvFormatter.format_measurement(&m, "x").unwrap();
        assert_eq!(row.split('\t').nth(7), Some("000"));
    }

    #[test]
    fn test_tsv_summary() {
        let text = TsvFormatter.format_summary(&report()).unwrap();
        assert!(text.starts_with("\nRecorded 3 samples in 20s, average values:\n# timestamp"));
        assert!(text.contains("3 20s   \t1.000\t2.000\t3.000\t4.000\t5.000\t15.000\t\t100\t\t\thttps://example.com/"));
    }

    #[test]
    fn test_json_record() {
        let json = JsonFormatter.format_measurement(&measurement(), "Paris").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dns_lookup_ns"], 1_234_000);
        assert_eq!(value["location"], "Paris");
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_no_samples_notice() {
        assert_eq!(TsvFormatter.format_no_samples(), NO_SAMPLES_NOTICE);
    }

    #[test]
    fn test_json_no_samples_stays_json() {
        let value: serde_json::Value = serde_json::from_str(&JsonFormatter.format_no_samples()).unwrap();
        assert!(value["summary"].is_null());
        assert_eq!(value["notice"], NO_SAMPLES_NOTICE);
    }
}
