//! Domain discovery: crawls a target domain's conventional pages, extracts
//! published addresses, and proposes role-prefix guesses at that domain.

pub(crate) mod extract;
pub(crate) mod reachability;

use crate::core::config::{get_random_sleep_duration, pick_user_agent, Config};
use crate::core::error::{AppError, Result};
use crate::core::models::{DiscoveryResult, PatternVerification};
use crate::utils::dns::create_resolver;
use crate::utils::domain::{host_of, normalize_origin};
use crate::validation::EmailValidator;

use rand::Rng;
use reqwest::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use trust_dns_resolver::TokioAsyncResolver;

/// Crawler for harvesting addresses from a company website.
pub struct DomainDiscovery {
    config: Arc<Config>,
    client: Client,
    resolver: Arc<TokioAsyncResolver>,
}

impl DomainDiscovery {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;
        let resolver = Arc::new(create_resolver(&config)?);
        tracing::debug!("DomainDiscovery initialized.");
        Ok(Self {
            config,
            client,
            resolver,
        })
    }

    /// Crawls up to `max_pages` conventional pages of the target domain.
    ///
    /// Returns `Err` only for malformed input; crawl-level failures are
    /// reported through the result's `status`/`failure` fields.
    pub async fn discover(&self, domain: &str, max_pages: usize) -> Result<DiscoveryResult> {
        let origin = normalize_origin(domain)?;
        let host = host_of(domain)?;
        let mut result = DiscoveryResult::new(origin.to_string());
        tracing::info!(target: "discovery_task", "Starting discovery for {} (max {} pages)", origin, max_pages);

        match reachability::check_reachability(
            &self.client,
            &self.resolver,
            &self.config,
            &origin,
            &host,
        )
        .await
        {
            reachability::Reachability::Reachable => {}
            reachability::Reachability::Resolvable { warning } => {
                tracing::warn!(target: "discovery_task", "{}: {}", origin, warning);
                result.warning = Some(warning);
            }
            reachability::Reachability::Unreachable { failure, detail } => {
                tracing::warn!(target: "discovery_task", "{} unreachable: {} ({})", origin, failure, detail);
                return Ok(DiscoveryResult::unreachable(
                    origin.to_string(),
                    failure,
                    detail,
                ));
            }
        }

        let pages: Vec<String> = self
            .config
            .common_pages
            .iter()
            .take(max_pages.max(1))
            .filter_map(|path| origin.join(path.trim_start_matches('/')).ok())
            .map(|url| url.to_string())
            .collect();

        // BTreeSet keeps the final listing stable across runs.
        let mut emails: BTreeSet<String> = BTreeSet::new();

        let page_count = pages.len();
        for (index, page_url) in pages.into_iter().enumerate() {
            // Occasional identity rotation keeps the crawl from presenting a
            // single fingerprint across every page.
            let rotate = index > 0 && rand::thread_rng().gen_bool(0.3);
            match self.scan_page(&page_url, origin.as_str(), rotate).await {
                Ok(found) => {
                    tracing::debug!(target: "discovery_task",
                        "Scanned {} ({} addresses)", page_url, found.len());
                    result.pages_scanned.push(page_url);
                    emails.extend(
                        found
                            .into_iter()
                            .filter(|e| extract::is_publishable(&self.config, e)),
                    );
                }
                Err(e) => {
                    // One failing page never aborts the crawl.
                    tracing::debug!(target: "discovery_task", "Skipping {}: {}", page_url, e);
                }
            }

            if index + 1 < page_count {
                tokio::time::sleep(get_random_sleep_duration(&self.config)).await;
            }
        }

        result.emails_found = emails.into_iter().collect();
        result.common_patterns = self.generate_patterns(&host);

        tracing::info!(target: "discovery_task",
            "Discovery for {} finished: {} addresses on {} pages, {} generated patterns",
            result.domain, result.emails_found.len(), result.pages_scanned.len(),
            result.common_patterns.len());
        Ok(result)
    }

    async fn scan_page(
        &self,
        page_url: &str,
        referer: &str,
        rotate_identity: bool,
    ) -> Result<std::collections::HashSet<String>> {
        let response = self
            .client
            .get(page_url)
            .header(
                reqwest::header::USER_AGENT,
                pick_user_agent(&self.config, rotate_identity),
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::REFERER, referer)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(extract::harvest_addresses(&self.config, &body))
    }

    /// Synthesizes one candidate address per configured role prefix.
    ///
    /// These are guesses, not observations. The placeholder denylist applies
    /// here too, so a denylisted domain generates nothing.
    pub fn generate_patterns(&self, host: &str) -> Vec<String> {
        self.config
            .role_prefixes
            .iter()
            .map(|prefix| format!("{}@{}", prefix, host))
            .filter(|candidate| extract::is_publishable(&self.config, candidate))
            .collect()
    }

    /// Runs generated patterns through the validator, partitioned by verdict.
    pub async fn verify_patterns(
        &self,
        patterns: &[String],
        validator: &EmailValidator,
        check_smtp: bool,
    ) -> PatternVerification {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for pattern in patterns {
            let result = validator.validate_with_options(pattern, check_smtp).await;
            if result.is_valid {
                valid.push(result);
            } else {
                invalid.push(result);
            }
        }
        PatternVerification {
            total_checked: patterns.len(),
            valid,
            invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> DomainDiscovery {
        DomainDiscovery::new(Arc::new(Config::default())).unwrap()
    }

    #[test]
    fn patterns_cover_role_prefixes() {
        let discovery = discovery();
        let patterns = discovery.generate_patterns("acme.com");
        assert!(patterns.contains(&"info@acme.com".to_string()));
        assert!(patterns.contains(&"sales@acme.com".to_string()));
        assert!(patterns.contains(&"careers@acme.com".to_string()));
        assert_eq!(patterns.len(), Config::default().role_prefixes.len());
    }

    #[test]
    fn denylisted_domain_generates_no_patterns() {
        let discovery = discovery();
        assert!(discovery.generate_patterns("example.com").is_empty());
        assert!(discovery.generate_patterns("test.com").is_empty());
    }

    #[tokio::test]
    async fn malformed_domain_is_an_input_error() {
        let discovery = discovery();
        assert!(discovery.discover("", 5).await.is_err());
        assert!(discovery.discover("http://", 5).await.is_err());
    }

    #[tokio::test]
    async fn pattern_verification_partitions_results() {
        let discovery = discovery();
        let validator = EmailValidator::new(Arc::new(Config::default())).unwrap();
        // Syntax-invalid patterns stay offline and land in the invalid bucket.
        let patterns = vec!["bad pattern".to_string(), "also-bad".to_string()];
        let outcome = discovery
            .verify_patterns(&patterns, &validator, false)
            .await;
        assert_eq!(outcome.total_checked, 2);
        assert!(outcome.valid.is_empty());
        assert_eq!(outcome.invalid.len(), 2);
    }
}
