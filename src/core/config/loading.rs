//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
/// Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    tracing::debug!("Attempting to parse TOML from: {}", file_path);
    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config` instance.
/// Internal helper for the builder. This merges settings.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(min_sleep) = file_config.network.min_sleep {
        config.sleep_between_pages.0 = min_sleep;
    }
    if let Some(max_sleep) = file_config.network.max_sleep {
        config.sleep_between_pages.1 = max_sleep;
    }
    if let Some(ref agents) = file_config.network.user_agents {
        if !agents.is_empty() {
            config.user_agents = agents.clone();
        }
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        if !servers.is_empty() {
            config.dns_servers = servers.clone();
        }
    }

    // SMTP
    if let Some(timeout) = file_config.smtp.probe_timeout {
        config.smtp_probe_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref sender) = file_config.smtp.probe_sender {
        config.smtp_probe_sender = sender.clone();
    }
    if let Some(ref helo) = file_config.smtp.probe_helo {
        config.smtp_probe_helo = helo.clone();
    }
    if let Some(delay) = file_config.smtp.send_delay {
        config.send_delay = delay;
    }

    // Discovery
    if let Some(ref pages) = file_config.discovery.common_pages {
        if !pages.is_empty() {
            config.common_pages = pages.clone();
        }
    }
    if let Some(ref prefixes) = file_config.discovery.role_prefixes {
        if !prefixes.is_empty() {
            config.role_prefixes = prefixes.clone();
        }
    }
    if let Some(ref addresses) = file_config.discovery.placeholder_addresses {
        config.placeholder_addresses = addresses.iter().map(|a| a.to_lowercase()).collect();
    }
    if let Some(ref domains) = file_config.discovery.placeholder_domains {
        config.placeholder_domains = domains.iter().map(|d| d.to_lowercase()).collect();
    }
    if let Some(max_pages) = file_config.discovery.max_pages {
        config.max_pages = max_pages;
    }

    // Validation
    if let Some(threshold) = file_config.validation.confidence_threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(delay) = file_config.validation.validation_delay {
        config.validation_delay = delay;
    }
    if let Some(capacity) = file_config.validation.mx_cache_capacity {
        config.mx_cache_capacity = capacity;
    }

    // Scheduler
    if let Some(ref path) = file_config.scheduler.jobs_file {
        if !path.trim().is_empty() {
            config.jobs_file = path.trim().to_string();
        }
    }
    if let Some(interval) = file_config.scheduler.poll_interval {
        config.poll_interval = Duration::from_secs(interval);
    }
    if let Some(backoff) = file_config.scheduler.error_backoff {
        config.error_backoff = Duration::from_secs(backoff);
    }
}
