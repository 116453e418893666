//! Core data structures shared across the validation, discovery, dispatch
//! and scheduling components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single multi-stage validation call.
///
/// Immutable once returned; the validator itself never persists these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    /// The normalized (trimmed, lowercased) address that was checked.
    pub email: String,
    /// Overall verdict: true iff `confidence` met the configured threshold.
    pub is_valid: bool,
    /// Additive 0-100 score across the stages that ran.
    pub confidence: u8,
    pub syntax_valid: bool,
    pub domain_valid: bool,
    pub mx_valid: bool,
    pub smtp_valid: bool,
    /// Diagnostic detail for the first failing or inconclusive stage.
    pub error: Option<String>,
}

impl ValidationResult {
    pub(crate) fn new(email: String) -> Self {
        Self {
            email,
            is_valid: false,
            confidence: 0,
            syntax_valid: false,
            domain_valid: false,
            mx_valid: false,
            smtp_valid: false,
            error: None,
        }
    }
}

/// Overall outcome of a discovery crawl.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Success,
    Unreachable,
}

/// Typed reason a target origin could not be crawled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrawlFailure {
    Timeout,
    ConnectionFailed,
    /// TLS negotiation failed and the plain-http fallback also failed.
    TlsFallbackFailed,
    HttpStatus(u16),
    /// The site answered with a soft block (403/429 style defenses).
    Blocked,
}

impl std::fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlFailure::Timeout => write!(f, "timeout"),
            CrawlFailure::ConnectionFailed => write!(f, "connection-failed"),
            CrawlFailure::TlsFallbackFailed => write!(f, "tls-failure-and-http-fallback-failed"),
            CrawlFailure::HttpStatus(code) => write!(f, "http-status-error ({})", code),
            CrawlFailure::Blocked => write!(f, "blocked"),
        }
    }
}

/// Result of crawling one domain for addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Target normalized to an absolute origin (e.g. `https://acme.com/`).
    pub domain: String,
    /// Distinct lowercased addresses observed on scanned pages, sorted.
    pub emails_found: Vec<String>,
    /// Pages that were fetched and scanned, in scan order.
    pub pages_scanned: Vec<String>,
    /// Generated role-prefix guesses at the crawled domain (not observed).
    pub common_patterns: Vec<String>,
    pub status: DiscoveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CrawlFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the site resolved but never answered HTTP (likely defended).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DiscoveryResult {
    pub(crate) fn new(domain: String) -> Self {
        Self {
            domain,
            emails_found: Vec::new(),
            pages_scanned: Vec::new(),
            common_patterns: Vec::new(),
            status: DiscoveryStatus::Success,
            failure: None,
            error: None,
            warning: None,
        }
    }

    pub(crate) fn unreachable(domain: String, failure: CrawlFailure, detail: String) -> Self {
        let mut result = Self::new(domain);
        result.status = DiscoveryStatus::Unreachable;
        result.error = Some(detail);
        result.failure = Some(failure);
        result
    }
}

/// Partitioned outcome of running generated patterns through the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternVerification {
    pub total_checked: usize,
    pub valid: Vec<ValidationResult>,
    pub invalid: Vec<ValidationResult>,
}

/// Per-recipient outcome of one dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendResult {
    pub recipient: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<DateTime<Utc>>,
}

impl SendResult {
    pub(crate) fn delivered(recipient: String) -> Self {
        Self {
            recipient,
            success: true,
            error: None,
            sent_time: Some(Utc::now()),
        }
    }

    pub(crate) fn failed(recipient: String, error: String) -> Self {
        Self {
            recipient,
            success: false,
            error: Some(error),
            sent_time: None,
        }
    }
}

/// Credentials for the authenticated outbound transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub password: String,
}

/// Lifecycle states of a scheduled job.
///
/// Transitions are monotonic: `pending -> sending -> completed|failed`, or
/// `pending -> cancelled`. Terminal states accept no further transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Sending,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// True for states that can still make progress through the scheduler.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Sending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Sending => "sending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A persisted, time-triggered bulk-send request.
///
/// Owned exclusively by the scheduler's durable store; `total_count` is fixed
/// at creation and `success_count` never exceeds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub message: String,
    pub is_html: bool,
    pub scheduled_time: DateTime<Utc>,
    pub credentials: SmtpCredentials,
    pub status: JobStatus,
    pub created_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<DateTime<Utc>>,
    pub success_count: usize,
    pub total_count: usize,
    pub results: Vec<SendResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// True once the job's scheduled time has arrived and it is still pending.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_time <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        let status: JobStatus = serde_json::from_str("\"sending\"").unwrap();
        assert_eq!(status, JobStatus::Sending);
    }

    #[test]
    fn job_status_activity() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Sending.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(!JobStatus::Failed.is_active());
        assert!(!JobStatus::Cancelled.is_active());
    }

    #[test]
    fn crawl_failure_display() {
        assert_eq!(CrawlFailure::Timeout.to_string(), "timeout");
        assert_eq!(
            CrawlFailure::HttpStatus(503).to_string(),
            "http-status-error (503)"
        );
    }

    #[test]
    fn job_due_only_when_pending_and_past() {
        let now = Utc::now();
        let mut job = Job {
            id: "ab12cd34".into(),
            recipients: vec!["a@b.com".into()],
            subject: "s".into(),
            message: "m".into(),
            is_html: false,
            scheduled_time: now - chrono::Duration::seconds(5),
            credentials: SmtpCredentials {
                host: "smtp.test".into(),
                port: 587,
                email: "me@test".into(),
                password: "pw".into(),
            },
            status: JobStatus::Pending,
            created_time: now,
            sent_time: None,
            success_count: 0,
            total_count: 1,
            results: vec![],
            error: None,
        };
        assert!(job.is_due(now));
        job.scheduled_time = now + chrono::Duration::hours(1);
        assert!(!job.is_due(now));
        job.scheduled_time = now - chrono::Duration::hours(1);
        job.status = JobStatus::Cancelled;
        assert!(!job.is_due(now));
    }
}
