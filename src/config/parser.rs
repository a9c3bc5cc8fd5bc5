//! Builds the run configuration from defaults, `.env`, environment and CLI

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
    types::OutputFormat,
};

/// A validated configuration plus what was noticed while building it
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Environment values that were ignored
    pub warnings: Vec<String>,
    pub env_file_loaded: bool,
}

/// Combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    load_env_file: bool,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            load_env_file: true,
        }
    }

    /// Skip the `.env` lookup
    pub fn without_env_file(mut self) -> Self {
        self.load_env_file = false;
        self
    }

    /// Defaults, then `.env`, then the environment, then CLI flags; validated last
    pub fn parse(&self) -> Result<LoadedConfig> {
        let mut config = Config::default();

        let env_file_loaded = if self.load_env_file {
            EnvManager::load_env_file()?
        } else {
            false
        };

        let warnings = config.merge_from_env();
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(LoadedConfig {
            config,
            warnings,
            env_file_loaded,
        })
    }

    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        // positional targets come first, PERFTEST_URL entries follow
        let mut urls = cli.urls.clone();
        urls.append(&mut config.target_urls);
        config.target_urls = urls;

        if let Some(delay) = cli.delay {
            config.delay_seconds = delay;
        }
        if let Some(max_failures) = cli.max_failures {
            config.max_failures = max_failures;
        }
        if let Some(limit) = cli.limit {
            config.iteration_limit = limit;
        }
        if cli.json {
            config.output_format = OutputFormat::Json;
        }
        if let Some(threshold) = cli.alert_threshold {
            config.alert_threshold_ms = threshold;
        }
        if let Some(interval) = cli.alert_interval {
            config.alert_interval_seconds = interval;
        }
        if cli.metrics {
            config.publish_metrics = true;
        }
        if let Some(name) = &cli.metric_name {
            config.metric_name = name.clone();
        }
        if let Some(namespace) = &cli.metric_namespace {
            config.metric_namespace = namespace.clone();
        }
        if let Some(webhook) = &cli.webhook {
            config.webhook_url = Some(webhook.clone());
        }
        if let Some(port) = cli.port {
            config.listen_port = port;
        }
        if let Some(location) = cli.location.as_ref().filter(|l| !l.trim().is_empty()) {
            config.location = Some(location.clone());
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if cli.no_color {
            config.enable_color = false;
        }

        // CLI only
        config.verbosity = cli.verbosity();
        config.log_json = cli.log_json;
    }
}

/// Parse with the `.env` file and return the validated configuration
pub fn load_config(cli: Cli) -> Result<LoadedConfig> {
    ConfigParser::new(cli).parse()
}

/// One setting per line, secrets left out
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Targets: {}", config.target_urls.join(", ")));
    summary.push(format!("Delay: {}s", config.delay_seconds));
    summary.push(format!("Max failures: {}", config.max_failures));
    summary.push(match config.iteration_limit {
        0 => "Iteration limit: none".to_string(),
        n => format!("Iteration limit: {}", n),
    });
    summary.push(format!("Output: {:?}", config.output_format));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    if config.alert_threshold_ms > 0 {
        summary.push(format!(
            "Alert: above {}ms, at most every {}s, sms {}",
            config.alert_threshold_ms,
            config.alert_interval_seconds,
            if config.twilio.is_configured() { "configured" } else { "not configured" }
        ));
    }
    if config.publish_metrics {
        summary.push(format!("Metrics: {}_{}", config.metric_namespace, config.metric_name));
    }
    if let Some(webhook) = &config.webhook_url {
        summary.push(format!("Webhook: {}", webhook));
    }
    if config.listen_port > 0 {
        summary.push(format!("Listen port: {}", config.listen_port));
    }
    summary.push(format!("Location: {}", config.location.as_deref().unwrap_or("(outbound address)")));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::ENV_LOCK;
    use clap::Parser;
    use std::env;

    const VARS: &[&str] = &[
        "PERFTEST_URL",
        "PERFTEST_DELAY",
        "PERFTEST_MAX_FAILS",
        "PERFTEST_LIMIT",
        "PERFTEST_JSON",
        "PERFTEST_TIMEOUT",
        "PERFTEST_LOCATION",
        "RESPONSE_THRESHOLD",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn parse(args: &[&str]) -> Result<LoadedConfig> {
        ConfigParser::new(Cli::parse_from(args)).without_env_file().parse()
    }

    #[test]
    fn test_defaults_with_a_target() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let loaded = parse(&["perftest", "https://example.com/"]).unwrap();
        let config = loaded.config;
        assert_eq!(config.delay_seconds, 10);
        assert_eq!(config.max_failures, 10);
        assert_eq!(config.iteration_limit, 0);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.verbosity, 1);
        assert!(loaded.warnings.is_empty());
        assert!(!loaded.env_file_loaded);
    }

    #[test]
    fn test_no_targets_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        assert!(parse(&["perftest"]).is_err());
    }

    #[test]
    fn test_cli_beats_environment() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("PERFTEST_DELAY", "30");
        env::set_var("PERFTEST_MAX_FAILS", "4");
        env::set_var("PERFTEST_LOCATION", "from-env");

        let config = parse(&["perftest", "-d", "2", "-L", "from-cli", "http://a.test/"]).unwrap().config;
        assert_eq!(config.delay_seconds, 2);
        assert_eq!(config.max_failures, 4);
        assert_eq!(config.location.as_deref(), Some("from-cli"));

        clear_env();
    }

    #[test]
    fn test_environment_urls_are_appended() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("PERFTEST_URL", "http://env1.test/  http://env2.test/");

        let config = parse(&["perftest", "http://cli.test/"]).unwrap().config;
        assert_eq!(config.target_urls, vec!["http://cli.test/", "http://env1.test/", "http://env2.test/"]);

        let only_env = parse(&["perftest"]).unwrap().config;
        assert_eq!(only_env.target_urls.len(), 2);

        clear_env();
    }

    #[test]
    fn test_bad_environment_value_warns() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("PERFTEST_DELAY", "soon");
        env::set_var("PERFTEST_JSON", "true");

        let loaded = parse(&["perftest", "http://a.test/"]).unwrap();
        assert_eq!(loaded.config.delay_seconds, 10);
        assert_eq!(loaded.config.output_format, OutputFormat::Json);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("PERFTEST_DELAY"));

        clear_env();
    }

    #[test]
    fn test_out_of_range_environment_values_fall_back() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        for (var, value) in [("PERFTEST_MAX_FAILS", "0"), ("PERFTEST_TIMEOUT", "0"), ("PERFTEST_TIMEOUT", "99999")] {
            clear_env();
            env::set_var(var, value);

            let loaded = parse(&["perftest", "http://a.test/"])
                .unwrap_or_else(|e| panic!("{}={} aborted the run: {}", var, value, e));
            assert_eq!(loaded.config.max_failures, 10);
            assert_eq!(loaded.config.timeout_seconds, 10);
            assert_eq!(loaded.warnings.len(), 1, "{}={}", var, value);
            assert!(loaded.warnings[0].contains(var));
        }

        clear_env();
        env::set_var("PERFTEST_TIMEOUT", "300");
        env::set_var("PERFTEST_MAX_FAILS", "1");
        let loaded = parse(&["perftest", "http://a.test/"]).unwrap();
        assert_eq!(loaded.config.timeout_seconds, 300);
        assert_eq!(loaded.config.max_failures, 1);
        assert!(loaded.warnings.is_empty());

        clear_env();
    }

    #[test]
    fn test_unsupported_scheme_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        assert!(parse(&["perftest", "ftp://files.test/"]).is_err());
    }

    #[test]
    fn test_config_summary() {
        let config = Config {
            target_urls: vec!["https://a.test/".to_string()],
            alert_threshold_ms: 500,
            publish_metrics: true,
            ..Default::default()
        };
        let summary = display_config_summary(&config);
        assert!(summary.contains("Targets: https://a.test/"));
        assert!(summary.contains("Alert: above 500ms"));
        assert!(summary.contains("sms not configured"));
        assert!(summary.contains("Metrics: http_perf_resp_time_ms"));
        assert!(summary.contains("Iteration limit: none"));
    }
}
