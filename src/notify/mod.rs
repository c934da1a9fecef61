// src/notify/mod.rs
//! Outbound mail: transport contract, SMTP and log-only transports, and the
//! daily distribution driver.

pub mod distribute;
pub mod email;

use async_trait::async_trait;
use metrics::describe_counter;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::info;

use crate::error::MailError;

pub use distribute::{DistributionDriver, DistributionSummary};
pub use email::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// First line of the server reply, when the transport has one.
    pub server_reply: Option<String>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryResult, MailError>;
    fn name(&self) -> &'static str;
}

/// Used when SMTP is not configured: every mail is logged and reported sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryResult, MailError> {
        info!(
            target: "distribute",
            recipient = %mail.to,
            subject = %mail.subject,
            text_len = mail.text.len(),
            "mail not sent (log transport)"
        );
        Ok(DeliveryResult::default())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_emails_sent_total", "Digest emails accepted by the transport.");
        describe_counter!("digest_emails_failed_total", "Digest emails that could not be sent.");
        describe_counter!(
            "digest_reports_composed_total",
            "Reports composed for distribution."
        );
    });
}
