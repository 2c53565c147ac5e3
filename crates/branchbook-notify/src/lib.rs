//! # branchbook-notify: Invoice Notification Side Channel
//!
//! Drains the persisted notification outbox and hands each notice to a
//! [`NotificationSink`]. Delivery failures are retried with exponential
//! backoff and logged; they never reach the invoice operation that queued
//! the notice.
//!
//! ## Modules
//!
//! - [`dispatcher`] - Background polling loop and its shutdown handle
//! - [`sink`] - SMTP and log sinks
//! - [`render`] - Subject and plain-text body of a notice
//! - [`settings`] - Poll, retry and SMTP settings

pub mod dispatcher;
pub mod error;
pub mod render;
pub mod settings;
pub mod sink;

pub use dispatcher::{DispatchSummary, DispatcherHandle, NotificationDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use settings::{NotifySettings, SmtpSettings};
pub use sink::{LogSink, NotificationSink, SmtpSink};

use std::sync::Arc;

/// Picks the SMTP sink when a relay is configured, the log sink otherwise.
pub fn sink_from_settings(settings: &NotifySettings) -> NotifyResult<Arc<dyn NotificationSink>> {
    match &settings.smtp {
        Some(smtp) => Ok(Arc::new(SmtpSink::new(smtp)?)),
        None => Ok(Arc::new(LogSink)),
    }
}
