//! Defines the structure mirroring the TOML configuration file format.

use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) network: NetworkConfig,
    #[serde(default)]
    pub(crate) dns: DnsConfig,
    #[serde(default)]
    pub(crate) smtp: SmtpConfig,
    #[serde(default)]
    pub(crate) discovery: DiscoveryConfig,
    #[serde(default)]
    pub(crate) validation: ValidationConfig,
    #[serde(default)]
    pub(crate) scheduler: SchedulerConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct NetworkConfig {
    pub(crate) request_timeout: Option<u64>,
    pub(crate) min_sleep: Option<f32>,
    pub(crate) max_sleep: Option<f32>,
    pub(crate) user_agents: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsConfig {
    pub(crate) dns_timeout: Option<u64>,
    pub(crate) dns_servers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SmtpConfig {
    pub(crate) probe_timeout: Option<u64>,
    pub(crate) probe_sender: Option<String>,
    pub(crate) probe_helo: Option<String>,
    pub(crate) send_delay: Option<f32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DiscoveryConfig {
    pub(crate) common_pages: Option<Vec<String>>,
    pub(crate) role_prefixes: Option<Vec<String>>,
    pub(crate) placeholder_addresses: Option<Vec<String>>,
    pub(crate) placeholder_domains: Option<Vec<String>>,
    pub(crate) max_pages: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ValidationConfig {
    pub(crate) confidence_threshold: Option<u8>,
    pub(crate) validation_delay: Option<f32>,
    pub(crate) mx_cache_capacity: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SchedulerConfig {
    pub(crate) jobs_file: Option<String>,
    pub(crate) poll_interval: Option<u64>,
    pub(crate) error_backoff: Option<u64>,
}
