//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading, building, and validation.

pub(crate) mod builder;
pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::core::error::Result;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

/// Runtime configuration settings used by the email-herald core logic.
pub struct Config {
    pub request_timeout: Duration,
    pub sleep_between_pages: (f32, f32),
    /// Pool of client identity strings rotated while crawling.
    pub user_agents: Vec<String>,

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    pub smtp_probe_timeout: Duration,
    pub smtp_probe_sender: String,
    pub smtp_probe_helo: String,

    /// Delay inserted between consecutive bulk sends, in seconds.
    pub send_delay: f32,
    /// Delay inserted between consecutive bulk validations, in seconds.
    pub validation_delay: f32,

    pub common_pages: Vec<String>,
    pub role_prefixes: Vec<String>,
    pub placeholder_addresses: HashSet<String>,
    pub placeholder_domains: HashSet<String>,
    pub email_regex: Regex,
    pub max_pages: usize,

    /// Additive confidence score at or above which an address is valid.
    pub confidence_threshold: u8,
    /// Bound on the number of domains the per-validator MX cache retains.
    pub mx_cache_capacity: usize,

    pub jobs_file: String,
    pub poll_interval: Duration,
    pub error_backoff: Duration,

    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        let common_pages = vec![
            "",
            "/contact",
            "/contact-us",
            "/about",
            "/about-us",
            "/team",
            "/staff",
            "/people",
            "/leadership",
            "/management",
            "/careers",
            "/jobs",
            "/support",
            "/help",
        ];
        let role_prefixes = vec![
            "info",
            "contact",
            "hello",
            "hi",
            "support",
            "sales",
            "admin",
            "office",
            "team",
            "help",
            "service",
            "marketing",
            "hr",
            "careers",
            "jobs",
        ];
        let placeholder_addresses: HashSet<String> = [
            "example@example.com",
            "test@test.com",
            "admin@admin.com",
            "user@user.com",
            "info@info.com",
            "contact@contact.com",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let placeholder_domains: HashSet<String> =
            ["example.com", "test.com", "domain.com", "yoursite.com"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            format!("email-herald/{}", env!("CARGO_PKG_VERSION")),
        ];
        let email_regex_pattern = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b";
        let email_regex = Regex::new(email_regex_pattern)
            .expect("Default email regex pattern failed to compile. This is a bug.");
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            request_timeout: Duration::from_secs(10),
            sleep_between_pages: (0.5, 1.5),
            user_agents,
            dns_timeout: Duration::from_secs(5),
            dns_servers,
            smtp_probe_timeout: Duration::from_secs(10),
            smtp_probe_sender: "verify-probe@example.com".to_string(),
            smtp_probe_helo: "localhost".to_string(),
            send_delay: 0.5,
            validation_delay: 0.1,
            common_pages: common_pages.iter().map(|s| s.to_string()).collect(),
            role_prefixes: role_prefixes.iter().map(|s| s.to_string()).collect(),
            placeholder_addresses,
            placeholder_domains,
            email_regex,
            max_pages: 5,
            confidence_threshold: 75,
            mx_cache_capacity: 512,
            jobs_file: "scheduled_jobs.json".to_string(),
            poll_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            loaded_config_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            request_timeout: self.request_timeout,
            sleep_between_pages: self.sleep_between_pages,
            user_agents: self.user_agents.clone(),
            dns_timeout: self.dns_timeout,
            dns_servers: self.dns_servers.clone(),
            smtp_probe_timeout: self.smtp_probe_timeout,
            smtp_probe_sender: self.smtp_probe_sender.clone(),
            smtp_probe_helo: self.smtp_probe_helo.clone(),
            send_delay: self.send_delay,
            validation_delay: self.validation_delay,
            common_pages: self.common_pages.clone(),
            role_prefixes: self.role_prefixes.clone(),
            placeholder_addresses: self.placeholder_addresses.clone(),
            placeholder_domains: self.placeholder_domains.clone(),
            email_regex: self.email_regex.clone(),
            max_pages: self.max_pages,
            confidence_threshold: self.confidence_threshold,
            mx_cache_capacity: self.mx_cache_capacity,
            jobs_file: self.jobs_file.clone(),
            poll_interval: self.poll_interval,
            error_backoff: self.error_backoff,
            loaded_config_path: self.loaded_config_path.clone(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("request_timeout", &self.request_timeout)
            .field("sleep_between_pages", &self.sleep_between_pages)
            .field("user_agents_count", &self.user_agents.len())
            .field("dns_timeout", &self.dns_timeout)
            .field("dns_servers_count", &self.dns_servers.len())
            .field("smtp_probe_timeout", &self.smtp_probe_timeout)
            .field("smtp_probe_sender", &self.smtp_probe_sender)
            .field("send_delay", &self.send_delay)
            .field("validation_delay", &self.validation_delay)
            .field("common_pages_count", &self.common_pages.len())
            .field("role_prefixes_count", &self.role_prefixes.len())
            .field("email_regex", &self.email_regex.as_str())
            .field("max_pages", &self.max_pages)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("mx_cache_capacity", &self.mx_cache_capacity)
            .field("jobs_file", &self.jobs_file)
            .field("poll_interval", &self.poll_interval)
            .field("error_backoff", &self.error_backoff)
            .field("loaded_config_path", &self.loaded_config_path)
            .finish()
    }
}

/// Utility function to get a random inter-page sleep duration based on [`Config`].
pub fn get_random_sleep_duration(config: &Config) -> Duration {
    use rand::Rng;
    let (min, max) = config.sleep_between_pages;
    if min >= max {
        return Duration::from_secs_f32(min.max(0.0));
    }
    let duration_secs = rand::thread_rng().gen_range(min..max);
    Duration::from_secs_f32(duration_secs)
}

/// Picks a client identity string from the configured pool.
pub(crate) fn pick_user_agent(config: &Config, rotate: bool) -> &str {
    use rand::Rng;
    if config.user_agents.is_empty() {
        return "email-herald";
    }
    if rotate && config.user_agents.len() > 1 {
        let idx = rand::thread_rng().gen_range(1..config.user_agents.len());
        &config.user_agents[idx]
    } else {
        &config.user_agents[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let config = Config::default();
        assert_eq!(config.confidence_threshold, 75);
        assert_eq!(config.common_pages[0], "");
        assert!(config.role_prefixes.contains(&"info".to_string()));
        assert!(config.placeholder_domains.contains("example.com"));
        assert!(config.email_regex.is_match("someone@acme.com"));
        assert!(!config.email_regex.is_match("not-an-address"));
    }

    #[test]
    fn sleep_duration_stays_in_range() {
        let mut config = Config::default();
        config.sleep_between_pages = (0.2, 0.4);
        for _ in 0..20 {
            let d = get_random_sleep_duration(&config);
            assert!(d >= Duration::from_secs_f32(0.2));
            assert!(d <= Duration::from_secs_f32(0.4));
        }
        config.sleep_between_pages = (0.3, 0.3);
        assert_eq!(
            get_random_sleep_duration(&config),
            Duration::from_secs_f32(0.3)
        );
    }

    #[test]
    fn rotated_identity_differs_from_default() {
        let config = Config::default();
        let default_ua = pick_user_agent(&config, false);
        assert_eq!(default_ua, config.user_agents[0]);
        for _ in 0..10 {
            assert_ne!(pick_user_agent(&config, true), default_ua);
        }
    }
}
