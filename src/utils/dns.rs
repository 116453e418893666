//! DNS helpers: resolver construction, address-record existence checks, and
//! mail-exchange lookups ordered by preference.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use std::net::{IpAddr, SocketAddr};
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Builds a tokio resolver pointed at the configured upstream servers.
///
/// Falls back to the default public resolver set when no server parses.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut resolver_config = ResolverConfig::new();
    let mut added = 0usize;
    for server in &config.dns_servers {
        match server.parse::<IpAddr>() {
            Ok(ip) => {
                let socket = SocketAddr::new(ip, 53);
                resolver_config.add_name_server(NameServerConfig::new(socket, Protocol::Udp));
                added += 1;
            }
            Err(e) => {
                tracing::warn!("Ignoring unparseable DNS server '{}': {}", server, e);
            }
        }
    }
    if added == 0 {
        tracing::warn!("No usable DNS servers configured; using default resolver set.");
        resolver_config = ResolverConfig::default();
    }

    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// True when the domain resolves to at least one address record.
///
/// Tries IPv4 first, then IPv6. Any resolution fault counts as "does not
/// resolve" rather than surfacing to the caller.
pub(crate) async fn domain_resolves(resolver: &TokioAsyncResolver, domain: &str) -> bool {
    match resolver.ipv4_lookup(domain).await {
        Ok(lookup) => lookup.iter().next().is_some(),
        Err(e) => {
            tracing::trace!(target: "dns_task", "A lookup for {} failed: {}", domain, e);
            match resolver.ipv6_lookup(domain).await {
                Ok(lookup) => lookup.iter().next().is_some(),
                Err(e) => {
                    tracing::debug!(target: "dns_task", "AAAA lookup for {} failed: {}", domain, e);
                    false
                }
            }
        }
    }
}

/// Resolves the domain's mail-exchange hosts, ordered by ascending preference.
///
/// `Err(AppError::NoDnsRecords)` when the domain has no MX records,
/// `Err(AppError::DnsTimeout)` on timeout, other resolution faults mapped to
/// `AppError::Dns`.
pub(crate) async fn mx_hosts(resolver: &TokioAsyncResolver, domain: &str) -> Result<Vec<String>> {
    match resolver.mx_lookup(domain).await {
        Ok(lookup) => {
            let mut records: Vec<(u16, String)> = lookup
                .iter()
                .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
                .collect();
            if records.is_empty() {
                return Err(AppError::NoDnsRecords(domain.to_string()));
            }
            Ok(order_mx(&mut records))
        }
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => {
                Err(AppError::NoDnsRecords(domain.to_string()))
            }
            ResolveErrorKind::Timeout => Err(AppError::DnsTimeout(domain.to_string())),
            _ => Err(AppError::Dns(e)),
        },
    }
}

/// Sorts (preference, exchange) pairs and returns the hostnames with the
/// trailing root dot stripped.
fn order_mx(records: &mut [(u16, String)]) -> Vec<String> {
    records.sort_by_key(|(preference, _)| *preference);
    records
        .iter()
        .map(|(_, exchange)| exchange.trim_end_matches('.').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mx_hosts_sorted_by_preference() {
        let mut records = vec![
            (20, "backup.mail.acme.com.".to_string()),
            (5, "primary.mail.acme.com.".to_string()),
            (10, "secondary.mail.acme.com.".to_string()),
        ];
        let ordered = order_mx(&mut records);
        assert_eq!(
            ordered,
            vec![
                "primary.mail.acme.com",
                "secondary.mail.acme.com",
                "backup.mail.acme.com"
            ]
        );
    }

    #[test]
    fn resolver_builds_from_default_config() {
        let config = Config::default();
        assert!(create_resolver(&config).is_ok());
    }
}
