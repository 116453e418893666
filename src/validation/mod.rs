//! Multi-stage deliverability validation engine.
//!
//! Stages run strictly in order: syntax, domain existence, mail-exchange
//! discovery, mailbox probe. Scoring is additive (25/25/25/25, partial
//! credit of 10 for a missing MX or an inconclusive probe). The verdict is
//! `confidence >= threshold` (75 by default). Callers may skip the probe
//! stage for speed on large batches; the threshold is unchanged, so a domain
//! without MX records can never reach a valid verdict once SMTP is skipped.

pub(crate) mod probe;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::ValidationResult;
use crate::utils::dns::{create_resolver, domain_resolves, mx_hosts};
use crate::utils::domain::domain_of_email;

use lettre::Address;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use trust_dns_resolver::TokioAsyncResolver;

/// Stateless-per-call address checker with a private per-instance MX cache.
///
/// The cache (positive and negative, keyed by domain) is a latency
/// optimization only; results are identical with or without it. It is owned
/// by this instance and never shared across validators.
pub struct EmailValidator {
    config: Arc<Config>,
    resolver: Arc<TokioAsyncResolver>,
    mx_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl EmailValidator {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let resolver = Arc::new(create_resolver(&config)?);
        tracing::debug!("EmailValidator initialized (DNS resolver ready).");
        Ok(Self {
            config,
            resolver,
            mx_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Validates a single address through all four stages.
    pub async fn validate(&self, email: &str) -> ValidationResult {
        self.validate_with_options(email, true).await
    }

    /// Validates a single address, optionally skipping the mailbox probe.
    pub async fn validate_with_options(&self, email: &str, check_smtp: bool) -> ValidationResult {
        let normalized = email.trim().to_lowercase();
        let mut result = ValidationResult::new(normalized.clone());

        // Stage 1: syntax.
        if !self.syntax_ok(&normalized) {
            result.error = Some("Syntax error: address is not RFC-shaped".to_string());
            tracing::debug!(target: "validate_task", "<{}> failed syntax check", normalized);
            return result;
        }
        result.syntax_valid = true;
        result.confidence += 25;

        // Stage 2: domain existence (A, then AAAA).
        let domain = domain_of_email(&normalized).to_string();
        if !domain_resolves(&self.resolver, &domain).await {
            result.error = Some("Domain does not exist".to_string());
            result.is_valid = result.confidence >= self.config.confidence_threshold;
            tracing::debug!(target: "validate_task", "<{}> domain {} does not resolve", normalized, domain);
            return result;
        }
        result.domain_valid = true;
        result.confidence += 25;

        // Stage 3: mail-exchange discovery. No MX is not a short-circuit;
        // the domain may still receive mail through an implicit MX.
        let mx_records = self.cached_mx(&domain).await;
        if mx_records.is_empty() {
            result.error = Some("No MX records found".to_string());
            result.confidence += 10;
        } else {
            result.mx_valid = true;
            result.confidence += 25;
        }

        // Stage 4: mailbox probe against the highest-priority exchange.
        if check_smtp {
            if let Some(mx_host) = mx_records.first() {
                let outcome = probe::probe_mailbox(
                    &normalized,
                    mx_host,
                    &self.config.smtp_probe_sender,
                    &self.config.smtp_probe_helo,
                    self.config.smtp_probe_timeout,
                );
                match outcome.deliverable {
                    Some(true) => {
                        result.smtp_valid = true;
                        result.confidence += 25;
                    }
                    None => {
                        result.error = Some(format!("SMTP check: {}", outcome.message));
                        result.confidence += 10;
                    }
                    Some(false) => {
                        result.error = Some(format!("SMTP check: {}", outcome.message));
                    }
                }
            }
        }

        result.is_valid = result.confidence >= self.config.confidence_threshold;
        tracing::debug!(target: "validate_task",
            "<{}> confidence {} (syntax={}, domain={}, mx={}, smtp={})",
            normalized, result.confidence, result.syntax_valid, result.domain_valid,
            result.mx_valid, result.smtp_valid);
        result
    }

    /// Validates a batch sequentially in input order, one result per address.
    ///
    /// A small pacing delay is inserted between addresses. A fault on one
    /// address never aborts the batch.
    pub async fn validate_bulk(
        &self,
        emails: &[String],
        check_smtp: bool,
    ) -> Vec<ValidationResult> {
        let mut results = Vec::with_capacity(emails.len());
        for (index, email) in emails.iter().enumerate() {
            results.push(self.validate_with_options(email, check_smtp).await);
            if index + 1 < emails.len() && self.config.validation_delay > 0.0 {
                tokio::time::sleep(std::time::Duration::from_secs_f32(
                    self.config.validation_delay,
                ))
                .await;
            }
        }
        results
    }

    fn syntax_ok(&self, email: &str) -> bool {
        Address::from_str(email).is_ok() && self.config.email_regex.is_match(email)
    }

    /// Returns the ordered MX host list for a domain, consulting the cache.
    ///
    /// Lookup failures are cached as an empty list (negative cache) so a dead
    /// domain is not re-queried for the lifetime of this instance.
    async fn cached_mx(&self, domain: &str) -> Vec<String> {
        if let Some(hosts) = self.mx_cache.lock().get(domain) {
            tracing::trace!(target: "validate_task", "MX cache hit for {}", domain);
            return hosts.clone();
        }

        let hosts = match mx_hosts(&self.resolver, domain).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::debug!(target: "validate_task", "MX lookup for {} failed: {}", domain, e);
                Vec::new()
            }
        };

        let mut cache = self.mx_cache.lock();
        if cache.len() >= self.config.mx_cache_capacity {
            // The cache only saves lookups; dropping it wholesale is safe.
            cache.clear();
        }
        cache.insert(domain.to_string(), hosts.clone());
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> EmailValidator {
        EmailValidator::new(Arc::new(Config::default())).unwrap()
    }

    #[tokio::test]
    async fn syntactically_invalid_address_scores_zero() {
        let validator = test_validator();
        for bad in ["not-an-address", "missing-at.example.com", "a@b", "@acme.com", ""] {
            let result = validator.validate_with_options(bad, false).await;
            assert!(!result.syntax_valid, "{} should fail syntax", bad);
            assert!(!result.domain_valid);
            assert!(!result.mx_valid);
            assert!(!result.smtp_valid);
            assert_eq!(result.confidence, 0);
            assert!(!result.is_valid);
            assert!(result.error.as_deref().unwrap().starts_with("Syntax error"));
        }
    }

    #[tokio::test]
    async fn unresolvable_domain_keeps_syntax_credit() {
        // A resolver pointed at a dead local server answers every lookup
        // with a fast failure, so no real DNS traffic happens.
        let mut config = Config::default();
        config.dns_servers = vec!["127.0.0.1".to_string()];
        config.dns_timeout = std::time::Duration::from_millis(200);
        let validator = EmailValidator::new(Arc::new(config)).unwrap();

        let result = validator
            .validate_with_options("user@nonexistent-domain-xyz123.invalid", false)
            .await;
        assert!(result.syntax_valid);
        assert!(!result.domain_valid);
        assert!(!result.mx_valid);
        assert!(!result.smtp_valid);
        assert_eq!(result.confidence, 25);
        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("Domain does not exist"));
    }

    #[tokio::test]
    async fn address_is_normalized_before_checking() {
        let validator = test_validator();
        let result = validator.validate_with_options("  BAD ADDRESS  ", false).await;
        assert_eq!(result.email, "bad address");
        assert!(!result.syntax_valid);
    }

    #[tokio::test]
    async fn negative_mx_cache_is_honored() {
        let validator = test_validator();
        validator
            .mx_cache
            .lock()
            .insert("dead.example".to_string(), Vec::new());
        let hosts = validator.cached_mx("dead.example").await;
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn positive_mx_cache_is_honored() {
        let validator = test_validator();
        validator.mx_cache.lock().insert(
            "acme.example".to_string(),
            vec!["mx1.acme.example".to_string()],
        );
        let hosts = validator.cached_mx("acme.example").await;
        assert_eq!(hosts, vec!["mx1.acme.example"]);
    }

    #[tokio::test]
    async fn bulk_validation_preserves_input_order() {
        let validator = test_validator();
        let inputs = vec![
            "first-bad".to_string(),
            "second-bad".to_string(),
            "third-bad".to_string(),
        ];
        let results = validator.validate_bulk(&inputs, false).await;
        assert_eq!(results.len(), inputs.len());
        for (input, result) in inputs.iter().zip(&results) {
            assert_eq!(&result.email, input);
            assert_eq!(result.confidence, 0);
        }
    }
}
