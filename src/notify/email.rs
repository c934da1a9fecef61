// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use std::time::Duration;

use super::{DeliveryResult, MailTransport, OutgoingMail};
use crate::config::SmtpConfig;
use crate::error::MailError;

/// SMTP relay (STARTTLS/TLS per lettre's `relay`).
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// `Ok(None)` when no host is configured.
    pub fn from_config(cfg: &SmtpConfig) -> Result<Option<Self>> {
        let Some(host) = cfg.host.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP host '{host}'"))?
            .timeout(Some(Duration::from_secs(cfg.timeout_secs)));
        if let Some(port) = cfg.port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Some(Self {
            mailer: builder.build(),
        }))
    }
}

/// Multipart/alternative message with plain-text and HTML parts.
pub fn build_message(mail: &OutgoingMail) -> Result<Message, MailError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|_| MailError::Address(mail.from.clone()))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|_| MailError::Address(mail.to.clone()))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            mail.text.clone(),
            mail.html.clone(),
        ))
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryResult, MailError> {
        let msg = build_message(mail)?;
        let resp = self
            .mailer
            .send(msg)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(DeliveryResult {
            server_reply: resp.first_line().map(str::to_string),
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
