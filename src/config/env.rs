//! Environment variables and the optional `.env` file

use crate::error::{AppError, Result};
use std::path::Path;

/// Serializes tests that touch the process environment
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Catalogue of supported environment variables
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the working directory when present.
    ///
    /// Returns whether a file was loaded. Variables already set in the
    /// process environment are not overwritten.
    pub fn load_env_file() -> Result<bool> {
        Self::load_env_file_from(Path::new(".env"))
    }

    pub fn load_env_file_from(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(true)
    }

    /// Name, description and example value of every supported variable
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PERFTEST_URL", "Space-separated target URLs, added to those on the command line", "https://example.com/ http://localhost:8080/health"),
            ("PERFTEST_DELAY", "Seconds between fetches of one target", "10"),
            ("PERFTEST_MAX_FAILS", "Failed fetches after which a target is dropped", "10"),
            ("PERFTEST_LIMIT", "Successful fetches per target before stopping (0 = unbounded)", "0"),
            ("PERFTEST_JSON", "Print measurements as JSON", "false"),
            ("RESPONSE_THRESHOLD", "Alert when the total time exceeds this many milliseconds", "500"),
            ("ALERT_INTERVAL", "Minimum seconds between two alerts for one target", "300"),
            ("PERFTEST_METRICS", "Record Prometheus metrics", "true"),
            ("HTTP_JSON_WEBHOOK", "https URL receiving every measurement as JSON", "https://hooks.example.com/perf"),
            ("PERFTEST_LISTEN_PORT", "Port for /ping, /status and /metrics (0 = off)", "9100"),
            ("PERFTEST_LOCATION", "Location label for every measurement", "eu-west-lab"),
            ("PERFTEST_TIMEOUT", "Request timeout in seconds (1-300)", "10"),
            ("ENABLE_COLOR", "Colored log output", "true"),
            ("TWILIO_ACCOUNT_SID", "Twilio account used for SMS alerts", "ACxxxxxxxxxxxxxxxx"),
            ("TWILIO_AUTH_TOKEN", "Twilio auth token", "secret"),
            ("TWILIO_SMS_SENDER", "Number the alert SMS is sent from", "+15005550006"),
            ("TWILIO_SMS_RECEIVERS", "Space-separated numbers that receive alerts", "+15551230001 +15551230002"),
        ]
    }

    /// Check a single value the way the config loader will read it
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "PERFTEST_URL" => {
                for url in value.split_whitespace() {
                    crate::types::Target::parse(url)
                        .map_err(|e| AppError::config(format!("Invalid PERFTEST_URL entry '{}': {}", url, e)))?;
                }
            }
            "PERFTEST_DELAY" | "PERFTEST_LIMIT" | "RESPONSE_THRESHOLD" | "ALERT_INTERVAL" => {
                value
                    .parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PERFTEST_MAX_FAILS" => {
                let fails: u32 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if fails == 0 {
                    return Err(AppError::config("PERFTEST_MAX_FAILS must be at least 1"));
                }
            }
            "PERFTEST_TIMEOUT" => {
                let timeout: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if timeout == 0 || timeout > crate::defaults::MAX_TIMEOUT_SECS {
                    return Err(AppError::config(format!("PERFTEST_TIMEOUT must be between 1 and 300, got: {}", timeout)));
                }
            }
            "PERFTEST_LISTEN_PORT" => {
                value
                    .parse::<u16>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PERFTEST_JSON" | "PERFTEST_METRICS" | "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "HTTP_JSON_WEBHOOK" => {
                crate::publish::parse_webhook_url(value)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Warnings for every supported variable that is set to a bad value
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| e.to_string())
            })
            .collect()
    }

    pub fn display_env_help() -> String {
        let mut help = String::from("Supported Environment Variables:\n\n");
        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }
        help.push_str("Precedence (highest first): command-line flags, environment, .env file, defaults.\n");
        help.push_str("Target URLs are the exception: PERFTEST_URL adds to the positional URLs.\n");
        help
    }

    /// Commented-out `.env` template covering every supported variable
    pub fn create_example_env_content() -> String {
        let mut content = String::from("# http-perftest configuration\n#\n# Uncomment and edit; command-line flags override these values.\n\n");
        for (var, description, example) in Self::get_supported_env_vars() {
            content.push_str(&format!("# {}\n# {}={}\n\n", description, var, example));
        }
        content
    }
}
