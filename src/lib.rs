//! # Email Herald Core Library
//!
//! This crate provides the core logic for validating email address
//! deliverability, discovering published addresses on company domains,
//! dispatching bulk mail through an authenticated relay, and scheduling
//! sends for later execution with crash recovery.
//!
//! It is designed to be used either directly as a library or via the
//! `email-herald` command-line tool (which uses this library).

mod core;
mod discovery;
mod dispatch;
mod scheduler;
mod utils;
mod validation;

pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    CrawlFailure, DiscoveryResult, DiscoveryStatus, Job, JobStatus, PatternVerification,
    SendResult, SmtpCredentials, ValidationResult,
};
pub use crate::discovery::DomainDiscovery;
pub use crate::dispatch::EmailDispatcher;
pub use crate::scheduler::{EmailScheduler, JobDispatcher, JobStore, SmtpJobDispatcher};
pub use crate::validation::EmailValidator;

use std::sync::Arc;

/// Initializes the validation engine. Essential shared state (DNS resolver,
/// MX cache) lives inside the returned instance.
pub fn initialize_validator(config: Arc<Config>) -> Result<EmailValidator> {
    EmailValidator::new(config)
}

/// Initializes the discovery crawler with its HTTP client and DNS resolver.
pub fn initialize_discovery(config: Arc<Config>) -> Result<DomainDiscovery> {
    DomainDiscovery::new(config)
}

/// Validates a batch of addresses, one result per input in input order.
pub async fn validate_addresses(
    validator: &EmailValidator,
    emails: &[String],
    check_smtp: bool,
) -> Vec<ValidationResult> {
    validator.validate_bulk(emails, check_smtp).await
}
