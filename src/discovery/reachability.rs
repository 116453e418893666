//! Ordered reachability strategies for a target origin.
//!
//! Uncooperative sites return soft blocks (403s, TLS negotiation failures)
//! rather than hard failures, so the probe walks an explicit strategy list
//! before concluding the site is down: a normal secure fetch, the same fetch
//! under a rotated client identity, a lightweight HEAD check, and a
//! plain-http fallback. As a last resort a pure name-resolution check
//! distinguishes "site is defensive" from "site does not exist".

use crate::core::config::{pick_user_agent, Config};
use crate::core::models::CrawlFailure;
use crate::utils::dns::domain_resolves;
use reqwest::Client;
use trust_dns_resolver::TokioAsyncResolver;
use url::Url;

/// One attempt in the fallback chain, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReachStrategy {
    /// GET over the normalized origin with the default identity.
    SecureDefault,
    /// GET with a rotated identity, for identity-keyed blocking.
    SecureRotated,
    /// HEAD probe; some defended sites still answer these.
    HeadProbe,
    /// GET over plain http, for origins with broken TLS.
    InsecureFallback,
}

/// The fixed order strategies are attempted in.
pub(crate) fn strategy_order() -> &'static [ReachStrategy] {
    &[
        ReachStrategy::SecureDefault,
        ReachStrategy::SecureRotated,
        ReachStrategy::HeadProbe,
        ReachStrategy::InsecureFallback,
    ]
}

/// Outcome of the reachability probe.
#[derive(Debug)]
pub(crate) enum Reachability {
    /// Some strategy got an HTTP answer; crawling can proceed.
    Reachable,
    /// HTTP never answered but the name resolves; crawl with a warning.
    Resolvable { warning: String },
    Unreachable {
        failure: CrawlFailure,
        detail: String,
    },
}

pub(crate) async fn check_reachability(
    client: &Client,
    resolver: &TokioAsyncResolver,
    config: &Config,
    origin: &Url,
    host: &str,
) -> Reachability {
    let mut last_failure = CrawlFailure::ConnectionFailed;
    let mut last_detail = String::new();
    let mut saw_tls_failure = false;

    for strategy in strategy_order() {
        match attempt(client, config, origin, *strategy).await {
            Ok(()) => {
                tracing::debug!(target: "discovery_task",
                    "{} reachable via {:?}", origin, strategy);
                return Reachability::Reachable;
            }
            Err((failure, detail)) => {
                tracing::debug!(target: "discovery_task",
                    "{} strategy {:?} failed: {} ({})", origin, strategy, failure, detail);
                if failure == CrawlFailure::TlsFallbackFailed {
                    saw_tls_failure = true;
                }
                last_failure = failure;
                last_detail = detail;
            }
        }
    }

    // Every HTTP strategy failed. If the name still resolves, the site is
    // likely defended rather than down.
    if domain_resolves(resolver, host).await {
        return Reachability::Resolvable {
            warning: "Site resolved but did not answer HTTP; it may be protected by \
                      anti-automation defenses. Results may be incomplete."
                .to_string(),
        };
    }

    if saw_tls_failure {
        last_failure = CrawlFailure::TlsFallbackFailed;
    }
    Reachability::Unreachable {
        failure: last_failure,
        detail: last_detail,
    }
}

async fn attempt(
    client: &Client,
    config: &Config,
    origin: &Url,
    strategy: ReachStrategy,
) -> std::result::Result<(), (CrawlFailure, String)> {
    let (url, rotate, head) = match strategy {
        ReachStrategy::SecureDefault => (origin.clone(), false, false),
        ReachStrategy::SecureRotated => (origin.clone(), true, false),
        ReachStrategy::HeadProbe => (origin.clone(), true, true),
        ReachStrategy::InsecureFallback => {
            let mut insecure = origin.clone();
            if insecure.scheme() == "https" && insecure.set_scheme("http").is_err() {
                return Err((
                    CrawlFailure::ConnectionFailed,
                    "Could not derive insecure fallback URL".to_string(),
                ));
            }
            (insecure, true, false)
        }
    };

    let request = if head {
        client.head(url.clone())
    } else {
        client.get(url.clone())
    };
    let response = request
        .header(reqwest::header::USER_AGENT, pick_user_agent(config, rotate))
        .send()
        .await
        .map_err(classify_request_error)?;

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        Ok(())
    } else if status.as_u16() == 403 || status.as_u16() == 429 {
        Err((
            CrawlFailure::Blocked,
            format!("HTTP {} from {}", status, url),
        ))
    } else {
        Err((
            CrawlFailure::HttpStatus(status.as_u16()),
            format!("HTTP {} from {}", status, url),
        ))
    }
}

/// Maps a reqwest error onto the typed crawl failure taxonomy.
pub(crate) fn classify_request_error(error: reqwest::Error) -> (CrawlFailure, String) {
    let detail = error.to_string();
    if error.is_timeout() {
        (CrawlFailure::Timeout, detail)
    } else if is_tls_error(&error) {
        (CrawlFailure::TlsFallbackFailed, detail)
    } else if error.is_connect() {
        (CrawlFailure::ConnectionFailed, detail)
    } else {
        (CrawlFailure::ConnectionFailed, detail)
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        let text = err.to_string().to_lowercase();
        if text.contains("tls") || text.contains("certificate") || text.contains("ssl") {
            return true;
        }
        source = err.source();
    }
    error.to_string().to_lowercase().contains("tls")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_try_secure_paths_before_insecure() {
        let order = strategy_order();
        assert_eq!(order[0], ReachStrategy::SecureDefault);
        assert_eq!(order[1], ReachStrategy::SecureRotated);
        assert_eq!(order[2], ReachStrategy::HeadProbe);
        assert_eq!(*order.last().unwrap(), ReachStrategy::InsecureFallback);
    }
}
