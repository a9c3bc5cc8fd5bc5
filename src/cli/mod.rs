//! Command-line interface
//!
//! Every setting that also has an environment variable is an `Option` here so
//! the config parser can tell an explicit flag from an absent one.

use clap::{ArgAction, Parser};

/// Repeatedly fetch HTTP(S) targets and report per-phase latency
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "perftest")]
#[command(version, about, long_about = None)]
#[command(disable_version_flag = true)]
#[command(after_help = "Environment variables (PERFTEST_URL, PERFTEST_DELAY, ...) and a .env file \
in the working directory are read as well; flags take precedence. Run with --env-help for the list.")]
pub struct Cli {
    /// Target URLs (http or https)
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Seconds to wait between fetches of the same target
    #[arg(short = 'd', long = "delay", value_name = "SECONDS")]
    pub delay: Option<u64>,

    /// Consecutive-or-not failures after which a target is dropped
    #[arg(short = 'f', long = "max-failures", value_name = "COUNT", value_parser = parse_positive_u32)]
    pub max_failures: Option<u32>,

    /// Stop each target after this many successful fetches (0 = never)
    #[arg(short = 'n', long = "limit", value_name = "COUNT")]
    pub limit: Option<u64>,

    /// Print one JSON object per measurement instead of TSV
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Send an alert when total response time exceeds this many milliseconds
    #[arg(short = 'A', long = "alert-threshold", value_name = "MS")]
    pub alert_threshold: Option<u64>,

    /// Minimum seconds between two alerts for the same target
    #[arg(short = 'M', long = "alert-interval", value_name = "SECONDS")]
    pub alert_interval: Option<u64>,

    /// Record measurements as Prometheus metrics
    #[arg(short = 'c', long = "metrics")]
    pub metrics: bool,

    /// Histogram name for published response times
    #[arg(long = "metric-name", value_name = "NAME")]
    pub metric_name: Option<String>,

    /// Prefix for every published metric
    #[arg(long = "metric-namespace", value_name = "NAMESPACE")]
    pub metric_namespace: Option<String>,

    /// POST each measurement as JSON to this https URL
    #[arg(short = 'W', long = "webhook", value_name = "URL")]
    pub webhook: Option<String>,

    /// Serve /ping, /status and /metrics on this port (0 = off)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Location label attached to every measurement
    #[arg(short = 'L', long = "location", value_name = "LABEL")]
    pub location: Option<String>,

    /// Per-request timeout in seconds
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", conflicts_with_all = ["verbose", "trace"])]
    pub quiet: bool,

    /// More log output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log everything, including per-phase tracing
    #[arg(short = 'V', long = "trace")]
    pub trace: bool,

    /// Write log lines as JSON
    #[arg(long = "log-json")]
    pub log_json: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Print version
    #[arg(long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,

    /// List the supported environment variables and exit
    #[arg(long = "env-help")]
    pub env_help: bool,
}

impl Cli {
    /// Log verbosity: 0 quiet, 1 default, 2 verbose, 3 and up trace
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else if self.trace {
            3
        } else {
            1u8.saturating_add(self.verbose)
        }
    }

    pub fn has_targets(&self) -> bool {
        !self.urls.is_empty()
    }
}

fn parse_positive_u32(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("invalid number: {}", s)),
    }
}

/// Timeout in whole seconds, 1 to 300
fn parse_timeout(s: &str) -> Result<u64, String> {
    if s.starts_with('+') {
        return Err(format!("Invalid duration: {}", s));
    }
    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| match secs {
            0 => Err("Duration must be greater than 0".to_string()),
            s if s > crate::defaults::MAX_TIMEOUT_SECS => Err(format!("Duration cannot exceed {} seconds", crate::defaults::MAX_TIMEOUT_SECS)),
            s => Ok(s),
        })
}
