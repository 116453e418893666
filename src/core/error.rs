//! Defines the custom error types for the email-herald application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for validation, discovery, dispatch and scheduling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., clients, resolvers).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Specific DNS error indicating no relevant records were found.
    #[error("No DNS Records Found (MX/A): {0}")]
    NoDnsRecords(String),

    /// DNS operation timed out.
    #[error("DNS Timeout for domain: {0}")]
    DnsTimeout(String),

    /// Error during SMTP communication setup or command execution.
    #[error("SMTP Error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Error building a mail message before transmission.
    #[error("Mail Composition Error: {0}")]
    MailCompose(#[from] lettre::error::Error),

    /// Error parsing a mailbox address for the envelope.
    #[error("Mail Address Error: {0}")]
    MailAddress(#[from] lettre::address::AddressError),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),

    /// Indicates insufficient or malformed input data to proceed.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Failed to extract a domain from the provided URL.
    #[error("Failed to extract domain from URL: {0}")]
    DomainExtraction(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
