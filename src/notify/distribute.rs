// src/notify/distribute.rs
//! Daily digest fan-out: one report per subscriber group, one send per
//! recipient, one email-log row per attempt.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use super::{ensure_metrics_described, MailTransport, OutgoingMail};
use crate::error::{ComposeError, DistributionError};
use crate::guard::SingleFlight;
use crate::model::{EmailLogEntry, EmailStatus, PortfolioId, Subscription};
use crate::report::{EmailRenderer, RenderedEmail, Report, ReportComposer};
use crate::store::{EmailLogStore, SubscriptionStore};

/// Recipients sharing one composed report. `None` is the general digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientGroup {
    pub portfolio_id: Option<PortfolioId>,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistributionSummary {
    pub groups: usize,
    pub reports_composed: usize,
    pub compose_failures: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Portfolio groups by ascending id, then the general group. Emails are
/// deduplicated case-insensitively within a group.
pub fn group_subscriptions(subs: &[Subscription]) -> Vec<RecipientGroup> {
    let mut by_portfolio: BTreeMap<PortfolioId, Vec<String>> = BTreeMap::new();
    let mut general: Vec<String> = Vec::new();
    let mut seen: HashSet<(Option<PortfolioId>, String)> = HashSet::new();

    for s in subs.iter().filter(|s| s.active) {
        let email = s.email.trim();
        if email.is_empty() || !seen.insert((s.portfolio_id, email.to_lowercase())) {
            continue;
        }
        match s.portfolio_id {
            Some(id) => by_portfolio.entry(id).or_default().push(email.to_string()),
            None => general.push(email.to_string()),
        }
    }

    let mut groups: Vec<RecipientGroup> = by_portfolio
        .into_iter()
        .map(|(id, emails)| RecipientGroup {
            portfolio_id: Some(id),
            emails,
        })
        .collect();
    if !general.is_empty() {
        groups.push(RecipientGroup {
            portfolio_id: None,
            emails: general,
        });
    }
    groups
}

pub struct DistributionDriver {
    subscriptions: Arc<dyn SubscriptionStore>,
    email_log: Arc<dyn EmailLogStore>,
    composer: ReportComposer,
    renderer: EmailRenderer,
    transport: Arc<dyn MailTransport>,
    from: String,
    guard: SingleFlight,
}

impl DistributionDriver {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        email_log: Arc<dyn EmailLogStore>,
        composer: ReportComposer,
        renderer: EmailRenderer,
        transport: Arc<dyn MailTransport>,
        from: impl Into<String>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            subscriptions,
            email_log,
            composer,
            renderer,
            transport,
            from: from.into(),
            guard: SingleFlight::new("distribution"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_busy()
    }

    pub async fn send_daily_report(&self) -> Result<DistributionSummary, DistributionError> {
        self.send_daily_report_at(Utc::now()).await
    }

    pub async fn send_daily_report_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DistributionSummary, DistributionError> {
        let _permit = self.guard.try_acquire()?;
        let subs = self.subscriptions.list_active().await?;
        let groups = group_subscriptions(&subs);
        info!(
            target: "distribute",
            subscriptions = subs.len(),
            groups = groups.len(),
            transport = self.transport.name(),
            "daily distribution started"
        );

        let mut summary = DistributionSummary {
            groups: groups.len(),
            ..Default::default()
        };
        for group in &groups {
            self.distribute_group(group, now, &mut summary).await;
        }

        info!(
            target: "distribute",
            sent = summary.sent,
            failed = summary.failed,
            compose_failures = summary.compose_failures,
            "daily distribution finished"
        );
        Ok(summary)
    }

    /// Compose and render without sending or logging anything.
    pub async fn preview(
        &self,
        portfolio_id: Option<PortfolioId>,
        target_date: Option<NaiveDate>,
    ) -> Result<RenderedEmail, ComposeError> {
        let report = match portfolio_id {
            Some(id) => self.composer.compose_portfolio_report(id, target_date).await?,
            None => self.composer.compose_general_report().await?,
        };
        Ok(self.renderer.render(&report))
    }

    async fn compose(&self, portfolio_id: Option<PortfolioId>, now: DateTime<Utc>) -> Result<Report, ComposeError> {
        match portfolio_id {
            Some(id) => self.composer.compose_portfolio_report_at(id, None, now).await,
            None => self.composer.compose_general_report_at(now).await,
        }
    }

    async fn distribute_group(
        &self,
        group: &RecipientGroup,
        now: DateTime<Utc>,
        summary: &mut DistributionSummary,
    ) {
        let report = match self.compose(group.portfolio_id, now).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    target: "distribute",
                    portfolio_id = ?group.portfolio_id,
                    recipients = group.emails.len(),
                    error = %e,
                    "report composition failed, group skipped"
                );
                summary.compose_failures += 1;
                let subject = self.renderer.fallback_subject(group.portfolio_id, now.date_naive());
                for email in &group.emails {
                    self.record(email, &subject, EmailStatus::Failed, Some(e.to_string()))
                        .await;
                    counter!("digest_emails_failed_total").increment(1);
                    summary.failed += 1;
                }
                return;
            }
        };
        counter!("digest_reports_composed_total").increment(1);
        summary.reports_composed += 1;
        let rendered = self.renderer.render(&report);

        for email in &group.emails {
            let mail = OutgoingMail {
                from: self.from.clone(),
                to: email.clone(),
                subject: rendered.subject.clone(),
                html: rendered.html.clone(),
                text: rendered.text.clone(),
            };
            match self.transport.send(&mail).await {
                Ok(_) => {
                    self.record(email, &rendered.subject, EmailStatus::Sent, None).await;
                    counter!("digest_emails_sent_total").increment(1);
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(target: "distribute", recipient = %email, error = %e, "send failed");
                    self.record(email, &rendered.subject, EmailStatus::Failed, Some(e.to_string()))
                        .await;
                    counter!("digest_emails_failed_total").increment(1);
                    summary.failed += 1;
                }
            }
        }
    }

    async fn record(&self, recipient: &str, subject: &str, status: EmailStatus, error: Option<String>) {
        let entry = EmailLogEntry {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            status,
            error_message: error,
            sent_at: Utc::now(),
        };
        if let Err(e) = self.email_log.append(entry).await {
            warn!(target: "distribute", recipient, error = %e, "email log append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(email: &str, portfolio_id: Option<PortfolioId>, active: bool) -> Subscription {
        Subscription {
            email: email.into(),
            portfolio_id,
            active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn groups_by_portfolio_then_general() {
        let groups = group_subscriptions(&[
            sub("g@x.test", None, true),
            sub("b@x.test", Some(2), true),
            sub("a@x.test", Some(1), true),
            sub("A@X.TEST", Some(1), true),
            sub("off@x.test", Some(1), false),
            sub("a@x.test", None, true),
        ]);
        assert_eq!(
            groups,
            vec![
                RecipientGroup {
                    portfolio_id: Some(1),
                    emails: vec!["a@x.test".into()]
                },
                RecipientGroup {
                    portfolio_id: Some(2),
                    emails: vec!["b@x.test".into()]
                },
                RecipientGroup {
                    portfolio_id: None,
                    emails: vec!["g@x.test".into(), "a@x.test".into()]
                },
            ]
        );
    }

    #[test]
    fn no_subscriptions_no_groups() {
        assert!(group_subscriptions(&[]).is_empty());
    }
}
