//! Raw port-25 mailbox probe: an unauthenticated EHLO/MAIL FROM/RCPT TO
//! conversation whose only purpose is reading the final reply code.

use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Ehlo, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

/// Outcome of one mailbox probe.
#[derive(Debug, Clone)]
pub(crate) struct ProbeOutcome {
    /// `Some(true)` = deliverable, `Some(false)` = rejected, `None` = inconclusive.
    pub deliverable: Option<bool>,
    /// Detail for diagnostics; raw code/message for unexpected replies.
    pub message: String,
}

impl ProbeOutcome {
    fn deliverable() -> Self {
        Self {
            deliverable: Some(true),
            message: "SMTP accepted recipient".to_string(),
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            deliverable: Some(false),
            message,
        }
    }

    fn inconclusive(message: String) -> Self {
        Self {
            deliverable: None,
            message,
        }
    }
}

/// Probes the highest-priority mail exchange for a recipient address.
///
/// Opens a plaintext session on port 25, walks EHLO -> MAIL FROM -> RCPT TO
/// and interprets the final reply code. The session is always quit, whatever
/// the outcome. All transport faults downgrade to an inconclusive outcome;
/// this function never fails the surrounding validation call.
pub(crate) fn probe_mailbox(
    email: &str,
    mx_host: &str,
    sender: &str,
    helo: &str,
    timeout: Duration,
) -> ProbeOutcome {
    let recipient = match Address::from_str(email) {
        Ok(addr) => addr,
        Err(e) => {
            return ProbeOutcome::rejected(format!("Invalid recipient format: {}", e));
        }
    };
    let sender_address = match Address::from_str(sender) {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(target: "probe_task", "Configured probe sender '{}' is invalid: {}", sender, e);
            return ProbeOutcome::inconclusive(format!("Invalid probe sender in config: {}", e));
        }
    };

    let socket_addr = match (mx_host, 25_u16).to_socket_addrs().ok().and_then(|mut a| a.next()) {
        Some(addr) => addr,
        None => {
            tracing::warn!(target: "probe_task", "Could not resolve mail server address: {}", mx_host);
            return ProbeOutcome::inconclusive(format!(
                "Could not resolve mail server address: {}",
                mx_host
            ));
        }
    };

    let helo_name = ClientId::Domain(helo.to_string());

    tracing::debug!(target: "probe_task", "Connecting to {} at {} (port 25)", mx_host, socket_addr);
    let mut conn = match SmtpConnection::connect(socket_addr, Some(timeout), &helo_name, None, None)
    {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(target: "probe_task", "Connection to {} failed: {}", mx_host, e);
            return classify_transport_fault(&e);
        }
    };

    match conn.command(Ehlo::new(helo_name.clone())) {
        Ok(response) if response.is_positive() => {
            tracing::trace!(target: "probe_task", "EHLO accepted by {} (code {})", mx_host, response.code());
        }
        Ok(response) => {
            tracing::warn!(target: "probe_task", "EHLO rejected by {}: {}", mx_host, response.code());
            conn.quit().ok();
            return ProbeOutcome::inconclusive(format!("EHLO rejected: {}", response.code()));
        }
        Err(e) => {
            conn.quit().ok();
            return classify_transport_fault(&e);
        }
    }

    match conn.command(Mail::new(Some(sender_address), vec![])) {
        Ok(response) if response.is_positive() => {}
        Ok(response) => {
            let message = response.message().collect::<Vec<&str>>().join(" ");
            tracing::debug!(target: "probe_task", "MAIL FROM rejected by {}: {} {}", mx_host, response.code(), message);
            conn.quit().ok();
            return ProbeOutcome::inconclusive(format!(
                "MAIL command failed: {} {}",
                response.code(),
                message
            ));
        }
        Err(e) => {
            conn.quit().ok();
            return classify_transport_fault(&e);
        }
    }

    let outcome = match conn.command(Rcpt::new(recipient, vec![])) {
        Ok(response) => {
            let code = response.code().to_string();
            let message = response.message().collect::<Vec<&str>>().join(" ");
            tracing::debug!(target: "probe_task",
                "RCPT TO:<{}> reply from {}: {} {}", email, mx_host, code, message);
            interpret_reply(&code, &message)
        }
        Err(e) => classify_transport_fault(&e),
    };

    conn.quit().ok();
    outcome
}

/// Maps the final RCPT reply code onto a probe outcome.
///
/// 250 is deliverable, 45x is a temporary failure (mailbox may exist), 55x is
/// a conclusive rejection, anything else is inconclusive with the raw reply
/// recorded.
pub(crate) fn interpret_reply(code: &str, message: &str) -> ProbeOutcome {
    match code {
        "250" => ProbeOutcome::deliverable(),
        "450" | "451" | "452" => {
            ProbeOutcome::inconclusive("Temporary failure, mailbox may exist".to_string())
        }
        "550" | "551" | "552" | "553" => {
            ProbeOutcome::rejected("Mailbox does not exist or rejected".to_string())
        }
        other => ProbeOutcome::inconclusive(format!("SMTP error {}: {}", other, message)),
    }
}

/// Downgrades a transport-level fault to an inconclusive outcome with a
/// recognizable reason, the same buckets the dispatch side reports.
fn classify_transport_fault(error: &lettre::transport::smtp::Error) -> ProbeOutcome {
    let err_string = error.to_string().to_lowercase();
    if err_string.contains("timed out") {
        ProbeOutcome::inconclusive("SMTP connection timeout".to_string())
    } else if err_string.contains("connection refused")
        || err_string.contains("network is unreachable")
    {
        ProbeOutcome::inconclusive("Cannot connect to mail server".to_string())
    } else if err_string.contains("connection reset") || err_string.contains("closed") {
        ProbeOutcome::inconclusive("SMTP server disconnected".to_string())
    } else {
        ProbeOutcome::inconclusive(format!("SMTP check failed: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_250_is_deliverable() {
        let outcome = interpret_reply("250", "OK");
        assert_eq!(outcome.deliverable, Some(true));
    }

    #[test]
    fn reply_45x_is_inconclusive() {
        for code in ["450", "451", "452"] {
            let outcome = interpret_reply(code, "try later");
            assert_eq!(outcome.deliverable, None);
            assert!(outcome.message.contains("may exist"));
        }
    }

    #[test]
    fn reply_55x_is_rejected() {
        for code in ["550", "551", "552", "553"] {
            let outcome = interpret_reply(code, "no such user");
            assert_eq!(outcome.deliverable, Some(false));
        }
    }

    #[test]
    fn unexpected_reply_keeps_raw_code() {
        let outcome = interpret_reply("421", "service not available");
        assert_eq!(outcome.deliverable, None);
        assert!(outcome.message.contains("421"));
        assert!(outcome.message.contains("service not available"));
    }
}
