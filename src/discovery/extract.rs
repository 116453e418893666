//! Address extraction from fetched pages and placeholder filtering.

use crate::core::config::Config;
use crate::utils::domain::domain_of_email;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::borrow::Cow;
use std::collections::HashSet;

/// Matches `name [at] domain [dot] tld` spellings (parentheses too).
static OBFUSCATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b([a-z0-9._%+-]+)\s*[\[\(]\s*at\s*[\]\)]\s*([a-z0-9.-]+)\s*[\[\(]\s*dot\s*[\]\)]\s*([a-z]{2,})\b",
    )
    .expect("Obfuscated address pattern failed to compile. This is a bug.")
});

/// Extracts every address-shaped substring from a page.
///
/// Runs the pattern over the raw document and over a cleaned-text rendering
/// of it; markup sometimes hides addresses from one view but not the other
/// (mailto hrefs vs. obfuscated text nodes). Bracketed at/dot spellings are
/// rewritten to plain form first. Results are lowercased.
pub(crate) fn harvest_addresses(config: &Config, raw_html: &str) -> HashSet<String> {
    let mut found = HashSet::new();

    let raw = deobfuscate(raw_html);
    for m in config.email_regex.find_iter(&raw) {
        found.insert(m.as_str().to_lowercase());
    }

    let text = deobfuscate(&clean_text(raw_html)).into_owned();
    for m in config.email_regex.find_iter(&text) {
        found.insert(m.as_str().to_lowercase());
    }

    found
}

/// Rewrites `info [at] acme [dot] com` style spellings to `info@acme.com`.
fn deobfuscate(text: &str) -> Cow<'_, str> {
    OBFUSCATED_RE.replace_all(text, "$1@$2.$3")
}

/// Renders a document to plain text by concatenating its text nodes.
fn clean_text(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let mut text = String::new();
    for chunk in document.root_element().text() {
        text.push_str(chunk);
        text.push(' ');
    }
    text
}

/// True when an address survives the placeholder denylist.
///
/// Known placeholder addresses and addresses at placeholder domains
/// (example.com and friends) never count as discoveries.
pub(crate) fn is_publishable(config: &Config, email: &str) -> bool {
    let lowered = email.to_lowercase();
    if config.placeholder_addresses.contains(&lowered) {
        return false;
    }
    let domain = domain_of_email(&lowered);
    if domain.is_empty() || config.placeholder_domains.contains(domain) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn harvests_from_raw_markup_and_text() {
        let config = config();
        let html = r#"
            <html><body>
              <p>Reach us at Sales@Acme.Com or</p>
              <a href="mailto:support@acme.com">write support</a>
            </body></html>
        "#;
        let found = harvest_addresses(&config, html);
        assert!(found.contains("sales@acme.com"));
        assert!(found.contains("support@acme.com"));
    }

    #[test]
    fn harvest_deduplicates_case_variants() {
        let config = config();
        let html = "INFO@ACME.COM and info@acme.com";
        let found = harvest_addresses(&config, html);
        assert_eq!(found.len(), 1);
        assert!(found.contains("info@acme.com"));
    }

    #[test]
    fn obfuscated_spellings_are_rewritten() {
        let config = config();
        let html = "Write to press [at] acme [dot] com or legal (at) acme (dot) co";
        let found = harvest_addresses(&config, html);
        assert!(found.contains("press@acme.com"));
        assert!(found.contains("legal@acme.co"));
    }

    #[test]
    fn placeholder_addresses_are_filtered() {
        let config = config();
        assert!(!is_publishable(&config, "example@example.com"));
        assert!(!is_publishable(&config, "test@test.com"));
        assert!(!is_publishable(&config, "TEST@TEST.COM"));
        assert!(!is_publishable(&config, "anyone@example.com"));
        assert!(!is_publishable(&config, "hello@yoursite.com"));
        assert!(is_publishable(&config, "sales@acme.com"));
    }

    #[test]
    fn addresses_without_domain_are_filtered() {
        let config = config();
        assert!(!is_publishable(&config, "not-an-address"));
    }
}
