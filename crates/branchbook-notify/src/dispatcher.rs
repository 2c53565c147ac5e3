//! # Notification Dispatcher
//!
//! Background task that drains `notification_outbox`.
//!
//! ## Dispatch Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every poll_interval:                                                   │
//! │                                                                         │
//! │  1. SELECT due entries (oldest first, LIMIT batch_size)                 │
//! │  2. payload ──serde_json──► InvoiceNotice                               │
//! │  3. sink.send(notice)                                                   │
//! │       ok  → mark_delivered                                              │
//! │       err → mark_failed(error, now + initial × 2^attempts, capped)      │
//! │  4. an entry that reaches max_attempts is logged and never picked again │
//! │                                                                         │
//! │  shutdown() → loop exits after the current batch                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use branchbook_core::InvoiceNotice;
use branchbook_db::{Database, NotificationOutboxRepository, OutboxEntry};

use crate::error::{NotifyError, NotifyResult};
use crate::settings::NotifySettings;
use crate::sink::NotificationSink;

/// What one pass over the outbox did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Failures that used up the last attempt.
    pub abandoned: usize,
}

pub struct NotificationDispatcher {
    outbox: NotificationOutboxRepository,
    sink: Arc<dyn NotificationSink>,
    settings: NotifySettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> NotifyResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| NotifyError::ChannelError("Shutdown channel closed".into()))
    }
}

impl NotificationDispatcher {
    pub fn new(
        db: &Database,
        sink: Arc<dyn NotificationSink>,
        settings: NotifySettings,
    ) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = NotificationDispatcher {
            outbox: db.notification_outbox(),
            sink,
            settings,
            shutdown_rx,
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs the dispatch loop. Spawn this as a background task.
    pub async fn run(mut self) {
        info!(
            sink = self.sink.name(),
            poll_interval_secs = self.settings.poll_interval_secs,
            max_attempts = self.settings.max_attempts,
            "Notification dispatcher starting"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_due().await {
                        error!(error = %e, "Failed to process notification outbox");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Notification dispatcher stopped");
    }

    /// Sends every entry that is due now, up to `batch_size`.
    pub async fn dispatch_due(&self) -> NotifyResult<DispatchSummary> {
        let entries = self
            .outbox
            .get_due(Utc::now(), self.settings.max_attempts, self.settings.batch_size)
            .await?;

        let mut summary = DispatchSummary::default();
        if entries.is_empty() {
            debug!("No notifications due");
            return Ok(summary);
        }

        debug!(count = entries.len(), "Dispatching notifications");

        for entry in entries {
            match self.deliver(&entry).await {
                Ok(()) => {
                    self.outbox.mark_delivered(&entry.id).await?;
                    summary.delivered += 1;
                }
                Err(e) => {
                    let abandoned = self.record_failure(&entry, &e).await?;
                    summary.failed += 1;
                    if abandoned {
                        summary.abandoned += 1;
                    }
                }
            }
        }

        if summary.delivered > 0 || summary.failed > 0 {
            info!(
                delivered = summary.delivered,
                failed = summary.failed,
                abandoned = summary.abandoned,
                "Notification batch processed"
            );
        }

        Ok(summary)
    }

    async fn deliver(&self, entry: &OutboxEntry) -> NotifyResult<()> {
        let notice: InvoiceNotice = serde_json::from_str(&entry.payload)?;
        self.sink.send(&notice).await
    }

    /// Records the failed attempt. Returns true when it was the last one.
    async fn record_failure(&self, entry: &OutboxEntry, err: &NotifyError) -> NotifyResult<bool> {
        let prior = u32::try_from(entry.attempts).unwrap_or(u32::MAX);
        let delay = chrono::Duration::from_std(self.settings.backoff(prior))
            .unwrap_or_else(|_| chrono::Duration::seconds(self.settings.max_backoff_secs as i64));
        let next_attempt_at = Utc::now() + delay;

        self.outbox
            .mark_failed(&entry.id, &err.to_string(), next_attempt_at)
            .await?;

        let attempts = prior.saturating_add(1);
        if attempts >= self.settings.max_attempts {
            error!(
                entry_id = %entry.id,
                invoice_id = %entry.invoice_id,
                recipient = %entry.recipient,
                attempts,
                error = %err,
                "Notification abandoned after max attempts"
            );
            return Ok(true);
        }

        warn!(
            entry_id = %entry.id,
            invoice_id = %entry.invoice_id,
            attempts,
            retry_at = %next_attempt_at,
            error = %err,
            "Notification delivery failed, will retry"
        );
        Ok(false)
    }
}
