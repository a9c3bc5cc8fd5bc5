//! Configuration data model and validation

use crate::types::{AppError, OutputFormat, Result, Target};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::defaults::MAX_TIMEOUT_SECS;

/// SMS alert credentials and recipients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    /// Sender phone number
    pub sender: Option<String>,
    /// Destination phone numbers
    #[serde(default)]
    pub receivers: Vec<String>,
}

impl TwilioConfig {
    /// Credentials and sender are all present
    pub fn is_configured(&self) -> bool {
        self.account_sid.as_deref().is_some_and(|s| !s.is_empty())
            && self.auth_token.as_deref().is_some_and(|s| !s.is_empty())
            && self.sender.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target URLs to probe
    #[serde(default)]
    pub target_urls: Vec<String>,

    /// Seconds to wait between attempts on one target
    #[serde(default = "default_delay_secs")]
    pub delay_seconds: u64,

    /// Failed attempts after which a target gives up
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Successful measurements after which a target stops, 0 for no limit
    #[serde(default)]
    pub iteration_limit: u64,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Alert when a total exceeds this many milliseconds, 0 disables alerting
    #[serde(default)]
    pub alert_threshold_ms: u64,

    /// Minimum seconds between two alerts for one target
    #[serde(default = "default_alert_interval_secs")]
    pub alert_interval_seconds: u64,

    /// Record every measurement into the metrics recorder
    #[serde(default)]
    pub publish_metrics: bool,

    #[serde(default = "default_metric_name")]
    pub metric_name: String,

    #[serde(default = "default_metric_namespace")]
    pub metric_namespace: String,

    /// HTTPS endpoint receiving every measurement as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Introspection server port, 0 keeps it off
    #[serde(default)]
    pub listen_port: u16,

    /// Location label attached to every measurement
    #[serde(default)]
    pub location: Option<String>,

    /// Upper bound on one whole attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// 0 quiet, 1 normal, 2 verbose, 3 and up trace
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Log lines as JSON instead of console text
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub twilio: TwilioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_urls: Vec::new(),
            delay_seconds: default_delay_secs(),
            max_failures: default_max_failures(),
            iteration_limit: 0,
            output_format: OutputFormat::Text,
            alert_threshold_ms: 0,
            alert_interval_seconds: default_alert_interval_secs(),
            publish_metrics: false,
            metric_name: default_metric_name(),
            metric_namespace: default_metric_namespace(),
            webhook_url: None,
            listen_port: 0,
            location: None,
            timeout_seconds: default_timeout_secs(),
            verbosity: default_verbosity(),
            log_json: false,
            enable_color: default_enable_color(),
            twilio: TwilioConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn alert_threshold(&self) -> Duration {
        Duration::from_millis(self.alert_threshold_ms)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_seconds)
    }

    /// Parse every configured target
    pub fn targets(&self) -> Result<Vec<Target>> {
        self.target_urls.iter().map(|raw| Target::parse(raw)).collect()
    }

    /// Validate the configuration and return the first error
    pub fn validate(&self) -> Result<()> {
        if self.target_urls.is_empty() {
            return Err(AppError::config(
                "No target URLs given (pass them as arguments or set PERFTEST_URL)",
            ));
        }

        for url in &self.target_urls {
            Target::parse(url)
                .map_err(|e| AppError::config(format!("Invalid target URL '{}': {}", url, e)))?;
        }

        if self.max_failures == 0 {
            return Err(AppError::config("Max failures must be greater than 0"));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.metric_name.trim().is_empty() || self.metric_namespace.trim().is_empty() {
            return Err(AppError::config("Metric name and namespace cannot be empty"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration.
    ///
    /// Values that fail to parse keep the current setting; the returned list
    /// holds one warning per rejected variable.
    pub fn merge_from_env(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Ok(urls) = std::env::var("PERFTEST_URL") {
            self.target_urls
                .extend(urls.split_whitespace().map(String::from));
        }

        env_parsed("PERFTEST_DELAY", &mut self.delay_seconds, &mut warnings);
        env_parsed_where("PERFTEST_MAX_FAILS", &mut self.max_failures, &mut warnings, |n| *n >= 1, "must be at least 1");
        env_parsed("PERFTEST_LIMIT", &mut self.iteration_limit, &mut warnings);
        env_parsed("RESPONSE_THRESHOLD", &mut self.alert_threshold_ms, &mut warnings);
        env_parsed("ALERT_INTERVAL", &mut self.alert_interval_seconds, &mut warnings);
        env_parsed("PERFTEST_METRICS", &mut self.publish_metrics, &mut warnings);
        env_parsed("PERFTEST_LISTEN_PORT", &mut self.listen_port, &mut warnings);
        env_parsed_where(
            "PERFTEST_TIMEOUT",
            &mut self.timeout_seconds,
            &mut warnings,
            |secs| (1..=MAX_TIMEOUT_SECS).contains(secs),
            "must be between 1 and 300",
        );
        env_parsed("ENABLE_COLOR", &mut self.enable_color, &mut warnings);

        let mut json = self.output_format == OutputFormat::Json;
        env_parsed("PERFTEST_JSON", &mut json, &mut warnings);
        if json {
            self.output_format = OutputFormat::Json;
        }

        if let Some(webhook) = env_string("HTTP_JSON_WEBHOOK") {
            self.webhook_url = Some(webhook);
        }
        if let Some(location) = env_string("PERFTEST_LOCATION") {
            self.location = Some(location);
        }

        if let Some(sid) = env_string("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = Some(sid);
        }
        if let Some(token) = env_string("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = Some(token);
        }
        if let Some(sender) = env_string("TWILIO_SMS_SENDER") {
            self.twilio.sender = Some(sender);
        }
        if let Some(receivers) = env_string("TWILIO_SMS_RECEIVERS") {
            self.twilio.receivers = receivers.split_whitespace().map(String::from).collect();
        }

        warnings
    }
}

/// Non-empty, trimmed environment value
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str, target: &mut T, warnings: &mut Vec<String>)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_parsed_where(key, target, warnings, |_| true, "");
}

/// Like `env_parsed`, but a value failing `valid` is also ignored
fn env_parsed_where<T, F>(key: &str, target: &mut T, warnings: &mut Vec<String>, valid: F, expected: &str)
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&T) -> bool,
{
    if let Some(raw) = env_string(key) {
        match raw.parse::<T>() {
            Ok(value) if valid(&value) => *target = value,
            Ok(_) => warnings.push(format!("Ignoring {}='{}': {}", key, raw, expected)),
            Err(e) => warnings.push(format!("Ignoring {}='{}': {}", key, raw, e)),
        }
    }
}

// Default value functions for serde
fn default_delay_secs() -> u64 {
    crate::defaults::DEFAULT_DELAY.as_secs()
}

fn default_max_failures() -> u32 {
    crate::defaults::DEFAULT_MAX_FAILURES
}

fn default_alert_interval_secs() -> u64 {
    crate::defaults::DEFAULT_ALERT_INTERVAL.as_secs()
}

fn default_metric_name() -> String {
    crate::defaults::DEFAULT_METRIC_NAME.to_string()
}

fn default_metric_namespace() -> String {
    crate::defaults::DEFAULT_METRIC_NAMESPACE.to_string()
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_verbosity() -> u8 {
    1
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
