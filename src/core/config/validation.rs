//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values or set defaults where applicable and logical.
/// Internal helper for the builder's `build` method.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.sleep_between_pages.0 < 0.0 || config.sleep_between_pages.1 < 0.0 {
        return Err(AppError::Config(
            "Sleep durations cannot be negative.".to_string(),
        ));
    }
    if config.sleep_between_pages.0 > config.sleep_between_pages.1 {
        tracing::warn!(
            "Min sleep ({:.2}s) > Max sleep ({:.2}s). Setting max sleep = min sleep.",
            config.sleep_between_pages.0,
            config.sleep_between_pages.1
        );
        config.sleep_between_pages.1 = config.sleep_between_pages.0;
    }
    if config.send_delay < 0.0 {
        return Err(AppError::Config(
            "Send delay cannot be negative.".to_string(),
        ));
    }
    if config.validation_delay < 0.0 {
        return Err(AppError::Config(
            "Validation delay cannot be negative.".to_string(),
        ));
    }
    if config.dns_servers.is_empty() {
        tracing::warn!("DNS servers list is empty. Resolver might use system defaults or fail.");
    }
    if config.confidence_threshold > 100 {
        tracing::warn!(
            "Confidence threshold ({}) > 100. Clamping to 100.",
            config.confidence_threshold
        );
        config.confidence_threshold = 100;
    }
    if config.max_pages == 0 {
        tracing::warn!("Max pages was set to 0. Setting to 1.");
        config.max_pages = 1;
    }
    if config.mx_cache_capacity == 0 {
        tracing::warn!("MX cache capacity was set to 0. Setting to 1.");
        config.mx_cache_capacity = 1;
    }
    if !config.smtp_probe_sender.contains('@') || !config.smtp_probe_sender.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid SMTP probe sender format: {}",
            config.smtp_probe_sender
        )));
    }
    if config.user_agents.is_empty() {
        tracing::warn!("User-agent pool is empty. Crawling will use a bare fallback identity.");
    }
    if config.poll_interval.is_zero() {
        return Err(AppError::Config(
            "Scheduler poll interval must be greater than zero.".to_string(),
        ));
    }
    if config.jobs_file.trim().is_empty() {
        return Err(AppError::Config(
            "Jobs file path cannot be empty.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let mut config = Config::default();
        assert!(validate_config(&mut config).is_ok());
    }

    #[test]
    fn negative_sleep_rejected() {
        let mut config = Config::default();
        config.sleep_between_pages = (-0.1, 0.5);
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn inverted_sleep_range_clamped() {
        let mut config = Config::default();
        config.sleep_between_pages = (2.0, 1.0);
        validate_config(&mut config).unwrap();
        assert_eq!(config.sleep_between_pages, (2.0, 2.0));
    }

    #[test]
    fn bad_probe_sender_rejected() {
        let mut config = Config::default();
        config.smtp_probe_sender = "not-an-address".to_string();
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.poll_interval = std::time::Duration::ZERO;
        assert!(validate_config(&mut config).is_err());
    }
}
