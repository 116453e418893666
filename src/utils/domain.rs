//! Utility functions for handling domain names and URLs.

use crate::core::error::{AppError, Result};
use url::Url;

/// Parses a website or bare domain string into an absolute origin `Url`.
///
/// Adds the `https://` scheme when none is present, so `acme.com` becomes
/// `https://acme.com/`. Returns `Err(AppError::InvalidInput)` for empty input
/// and `Err(AppError::UrlParse)` when no host can be extracted.
pub(crate) fn normalize_origin(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(
            "Target domain input is empty".to_string(),
        ));
    }

    let with_scheme = if !trimmed.contains("://") {
        format!("https://{}", trimmed)
    } else {
        trimmed.to_string()
    };

    match Url::parse(&with_scheme) {
        Ok(url) => {
            if url.host_str().is_none() || url.host_str() == Some("") {
                tracing::error!("URL normalization resulted in URL without host: {}", url);
                Err(AppError::UrlParse(url::ParseError::EmptyHost))
            } else {
                tracing::debug!("Normalized '{}' to origin {}", trimmed, url);
                Ok(url)
            }
        }
        Err(e) => {
            tracing::error!("Failed to parse '{}' as URL: {}", with_scheme, e);
            Err(AppError::UrlParse(e))
        }
    }
}

/// Extracts the bare registrable host (e.g. `acme.com`) from a URL or domain
/// string, stripping any `www.` prefix and lowercasing.
pub(crate) fn host_of(input: &str) -> Result<String> {
    let url = normalize_origin(input)?;
    let host = url.host_str().ok_or_else(|| {
        AppError::DomainExtraction(format!("Could not extract host from parsed URL: {}", url))
    })?;

    let domain = host.strip_prefix("www.").unwrap_or(host).to_lowercase();

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        tracing::error!("Extracted domain '{}' appears invalid.", domain);
        return Err(AppError::DomainExtraction(format!(
            "Extracted domain appears invalid: {}",
            domain
        )));
    }
    Ok(domain)
}

/// Returns the domain part of an address. Empty when no `@` is present.
pub(crate) fn domain_of_email(email: &str) -> &str {
    email.rsplit('@').next().filter(|d| *d != email).unwrap_or("")
}
