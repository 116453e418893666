//! Bulk dispatch executor: authenticated outbound sends with per-recipient
//! result capture and pacing.

use crate::core::error::{AppError, Result};
use crate::core::models::{SendResult, SmtpCredentials};

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Sends one or many messages sequentially through a configured relay.
///
/// Every send opens its own transport session (connect, STARTTLS, auth,
/// transmit, close), so a failure on one recipient cannot poison the next.
pub struct EmailDispatcher {
    credentials: SmtpCredentials,
}

impl EmailDispatcher {
    pub fn new(credentials: SmtpCredentials) -> Self {
        Self { credentials }
    }

    /// Sends a single message, classifying any failure into the result.
    pub async fn send_one(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> SendResult {
        match self.transmit(recipient, subject, body, is_html).await {
            Ok(()) => {
                tracing::info!(target: "dispatch_task", "Delivered to <{}>", recipient);
                SendResult::delivered(recipient.to_string())
            }
            Err(e) => {
                let reason = classify_dispatch_error(&e);
                tracing::warn!(target: "dispatch_task", "Send to <{}> failed: {} ({})", recipient, reason, e);
                SendResult::failed(recipient.to_string(), reason.to_string())
            }
        }
    }

    /// Sends to every recipient in input order, one result per recipient.
    ///
    /// `delay` is inserted after every send except the last. An empty
    /// recipient list is an input error.
    pub async fn send_many(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        is_html: bool,
        delay: f32,
    ) -> Result<Vec<SendResult>> {
        if recipients.is_empty() {
            return Err(AppError::InvalidInput(
                "Recipient list is empty".to_string(),
            ));
        }
        let mut results = Vec::with_capacity(recipients.len());
        for (index, recipient) in recipients.iter().enumerate() {
            results.push(self.send_one(recipient, subject, body, is_html).await);
            if index + 1 < recipients.len() && delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f32(delay)).await;
            }
        }
        Ok(results)
    }

    /// Verifies host/credentials by connecting, upgrading and authenticating
    /// without transmitting any mail.
    pub async fn test_connection(&self) -> Result<()> {
        let transport = self.transport()?;
        let accepted = transport.test_connection().await?;
        if accepted {
            tracing::info!(target: "dispatch_task",
                "Connection test to {}:{} succeeded", self.credentials.host, self.credentials.port);
            Ok(())
        } else {
            Err(AppError::Generic(anyhow::anyhow!(
                "SMTP server {}:{} did not accept the connection test",
                self.credentials.host,
                self.credentials.port
            )))
        }
    }

    async fn transmit(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Result<()> {
        let content_type = if is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let message = Message::builder()
            .from(self.credentials.email.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(content_type)
            .body(body.to_string())?;

        let transport = self.transport()?;
        transport.send(message).await?;
        Ok(())
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.credentials.host)?
            .port(self.credentials.port)
            .credentials(Credentials::new(
                self.credentials.email.clone(),
                self.credentials.password.clone(),
            ))
            .build();
        Ok(transport)
    }
}

/// Buckets a dispatch failure into the user-facing taxonomy.
fn classify_dispatch_error(error: &AppError) -> &'static str {
    match error {
        AppError::MailAddress(_) => "Recipient or sender address could not be parsed.",
        AppError::MailCompose(_) => "Message could not be composed.",
        AppError::Smtp(e) => classify_smtp_failure(&e.to_string()),
        _ => "Unexpected error during send.",
    }
}

/// String-level classification of relay failures.
///
/// The transport error type does not expose which command failed, so this
/// matches on the reply text the way servers actually phrase it.
fn classify_smtp_failure(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    if lowered.contains("authentication")
        || lowered.contains("535")
        || lowered.contains("534")
        || lowered.contains("incorrect")
    {
        "Authentication failed. Check email credentials."
    } else if lowered.contains("rcpt") || lowered.contains("recipient") {
        "Recipient email address was refused by server."
    } else if lowered.contains("mail from") || lowered.contains("sender") {
        "Sender email address was refused by server."
    } else if lowered.contains("data") {
        "SMTP data error occurred."
    } else if lowered.contains("timed out")
        || lowered.contains("connection refused")
        || lowered.contains("network is unreachable")
        || lowered.contains("dns")
    {
        "Failed to connect to SMTP server."
    } else if lowered.contains("connection reset")
        || lowered.contains("closed")
        || lowered.contains("disconnected")
        || lowered.contains("eof")
    {
        "SMTP server disconnected unexpectedly."
    } else {
        "Unexpected error during send."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> SmtpCredentials {
        SmtpCredentials {
            host: "smtp.acme.test".to_string(),
            port: 587,
            email: "sender@acme.test".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_recipient_list_is_an_input_error() {
        let dispatcher = EmailDispatcher::new(credentials());
        let result = dispatcher.send_many(&[], "s", "b", false, 0.0).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn malformed_recipient_yields_failed_result_not_error() {
        let dispatcher = EmailDispatcher::new(credentials());
        let result = dispatcher
            .send_one("definitely not an address", "s", "b", false)
            .await;
        assert!(!result.success);
        assert!(result.sent_time.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("Recipient or sender address could not be parsed.")
        );
    }

    #[tokio::test]
    async fn send_many_returns_one_result_per_recipient_in_order() {
        let dispatcher = EmailDispatcher::new(credentials());
        // Malformed recipients fail during composition, before any network
        // traffic, so ordering is observable offline.
        let recipients = vec![
            "bad one".to_string(),
            "bad two".to_string(),
            "bad three".to_string(),
        ];
        let results = dispatcher
            .send_many(&recipients, "s", "b", false, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        for (recipient, result) in recipients.iter().zip(&results) {
            assert_eq!(&result.recipient, recipient);
            assert!(!result.success);
        }
    }

    #[test]
    fn smtp_failures_are_classified() {
        assert_eq!(
            classify_smtp_failure("535 5.7.8 Authentication credentials invalid"),
            "Authentication failed. Check email credentials."
        );
        assert_eq!(
            classify_smtp_failure("550 RCPT TO rejected: user unknown"),
            "Recipient email address was refused by server."
        );
        assert_eq!(
            classify_smtp_failure("553 MAIL FROM rejected"),
            "Sender email address was refused by server."
        );
        assert_eq!(
            classify_smtp_failure("connection timed out"),
            "Failed to connect to SMTP server."
        );
        assert_eq!(
            classify_smtp_failure("connection reset by peer"),
            "SMTP server disconnected unexpectedly."
        );
        assert_eq!(
            classify_smtp_failure("451 weird transient thing"),
            "Unexpected error during send."
        );
    }
}
