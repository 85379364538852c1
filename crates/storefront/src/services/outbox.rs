//! Background delivery of queued emails.
//!
//! The worker claims due messages in batches, hands each to the [`Mailer`],
//! and records the result. Failed deliveries are retried with exponential
//! backoff until `max_attempts` is reached, after which the message is
//! marked failed and left for inspection.
//!
//! The webhook handler wakes the worker through a shared [`Notify`] right
//! after it commits new messages; otherwise the worker polls.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::config::OutboxConfig;
use crate::db::{OutboxRepository, RepositoryError};
use crate::models::OutboxMessage;

use super::email::{Mailer, OutgoingEmail};

/// How long a claimed message stays invisible to other workers.
pub const CLAIM_LEASE: Duration = Duration::from_secs(300);

const BASE_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 3600;

/// Delay before the next attempt, after `attempts` failed ones.
///
/// 30s, 60s, 120s, ... capped at one hour.
#[must_use]
pub fn backoff_delay(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    let secs = BASE_BACKOFF_SECS.saturating_mul(1 << exponent);
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

/// Counts from one pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DrainReport {
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.sent + self.retried + self.failed
    }
}

/// Delivers outbox messages until shut down.
pub struct OutboxWorker {
    repo: Arc<dyn OutboxRepository>,
    mailer: Arc<dyn Mailer>,
    notify: Arc<Notify>,
    config: OutboxConfig,
}

impl OutboxWorker {
    #[must_use]
    pub fn new(
        repo: Arc<dyn OutboxRepository>,
        mailer: Arc<dyn Mailer>,
        notify: Arc<Notify>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            repo,
            mailer,
            notify,
            config,
        }
    }

    /// Spawn [`Self::run`] on the tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        info!("Spawning outbox worker");
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_attempts = self.config.max_attempts,
            "Outbox worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let full_batch = match self.drain_once().await {
                Ok(report) => {
                    if report.processed() > 0 {
                        info!(
                            sent = report.sent,
                            retried = report.retried,
                            failed = report.failed,
                            "Outbox batch processed"
                        );
                    }
                    i64::try_from(report.processed()).unwrap_or(i64::MAX)
                        >= self.config.batch_size
                }
                Err(e) => {
                    error!(error = %e, "Failed to claim outbox messages");
                    false
                }
            };

            // More may be waiting behind a full batch.
            if full_batch {
                continue;
            }

            tokio::select! {
                () = self.notify.notified() => debug!("Outbox worker woken"),
                () = tokio::time::sleep(self.config.poll_interval) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Outbox worker stopped");
    }

    /// Claim one batch of due messages and try to deliver each.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if claiming fails. Failures recording the
    /// outcome of a single message are logged and don't stop the batch.
    #[instrument(skip(self))]
    pub async fn drain_once(&self) -> Result<DrainReport, RepositoryError> {
        let messages = self
            .repo
            .claim_due(self.config.batch_size, CLAIM_LEASE)
            .await?;

        let mut report = DrainReport::default();
        for message in messages {
            self.deliver(message, &mut report).await;
        }
        Ok(report)
    }

    async fn deliver(&self, message: OutboxMessage, report: &mut DrainReport) {
        let email = OutgoingEmail {
            to: message.recipient,
            subject: message.subject,
            text_body: message.text_body,
            html_body: message.html_body,
        };

        let Err(send_error) = self.mailer.send(&email).await else {
            report.sent += 1;
            if let Err(e) = self.repo.mark_sent(message.id).await {
                error!(message_id = %message.id, error = %e, "Failed to mark message sent");
            }
            return;
        };

        let error_text = send_error.to_string();
        let attempts = u32::try_from(message.attempts).unwrap_or(u32::MAX);

        let recorded = if attempts >= self.config.max_attempts {
            report.failed += 1;
            error!(
                message_id = %message.id,
                kind = %message.kind,
                attempts,
                error = %error_text,
                "Giving up on outbox message"
            );
            self.repo.mark_failed(message.id, &error_text).await
        } else {
            report.retried += 1;
            let next_attempt_at = next_attempt_at(Utc::now(), attempts);
            warn!(
                message_id = %message.id,
                kind = %message.kind,
                attempts,
                next_attempt_at = %next_attempt_at,
                error = %error_text,
                "Email delivery failed, will retry"
            );
            self.repo
                .mark_retry(message.id, &error_text, next_attempt_at)
                .await
        };

        if let Err(e) = recorded {
            error!(message_id = %message.id, error = %e, "Failed to record delivery failure");
        }
    }
}

/// Backoff plus up to 10% jitter so retries from one batch spread out.
fn next_attempt_at(now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
    let delay = backoff_delay(attempts);
    let max_jitter_ms = u64::try_from(delay.as_millis() / 10).unwrap_or(0);
    let jitter = Duration::from_millis(rand::rng().random_range(0..=max_jitter_ms));

    chrono::Duration::from_std(delay + jitter).map_or(now, |d| now + d)
}
