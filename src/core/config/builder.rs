//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// This is the primary way users should create a `Config` object.
/// It handles loading from files, applying overrides, and validation.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn sleep_between_pages(mut self, min: f32, max: f32) -> Self {
        self.overrides.network.min_sleep = Some(min);
        self.overrides.network.max_sleep = Some(max);
        self
    }
    pub fn user_agents(mut self, agents: Vec<String>) -> Self {
        self.overrides.network.user_agents = Some(agents);
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn smtp_probe_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.probe_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_probe_sender(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.probe_sender = Some(value.into());
        self
    }
    pub fn smtp_probe_helo(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.probe_helo = Some(value.into());
        self
    }
    pub fn send_delay(mut self, seconds: f32) -> Self {
        self.overrides.smtp.send_delay = Some(seconds);
        self
    }
    pub fn common_pages(mut self, pages: Vec<String>) -> Self {
        self.overrides.discovery.common_pages = Some(pages);
        self
    }
    pub fn role_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.overrides.discovery.role_prefixes = Some(prefixes);
        self
    }
    pub fn max_pages(mut self, value: usize) -> Self {
        self.overrides.discovery.max_pages = Some(value);
        self
    }
    pub fn confidence_threshold(mut self, value: u8) -> Self {
        self.overrides.validation.confidence_threshold = Some(value);
        self
    }
    pub fn jobs_file(mut self, path: impl Into<String>) -> Self {
        self.overrides.scheduler.jobs_file = Some(path.into());
        self
    }
    pub fn poll_interval(mut self, duration: Duration) -> Self {
        self.overrides.scheduler.poll_interval = Some(duration.as_secs());
        self
    }
    pub fn error_backoff(mut self, duration: Duration) -> Self {
        self.overrides.scheduler.error_backoff = Some(duration.as_secs());
        self
    }

    /// Builds the final `Config` object, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./email-herald.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    tracing::debug!("Found potential default config file: {}", path_str);
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config);
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::info!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_take_effect() {
        let config = ConfigBuilder::new()
            .confidence_threshold(80)
            .max_pages(3)
            .send_delay(1.5)
            .smtp_probe_helo("probe.acme.test")
            .poll_interval(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(config.confidence_threshold, 80);
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.send_delay, 1.5);
        assert_eq!(config.smtp_probe_helo, "probe.acme.test");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = ConfigBuilder::new()
            .config_file("/definitely/not/here.toml")
            .build();
        assert!(result.is_err());
    }
}
