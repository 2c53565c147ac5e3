//! # Notification Sinks
//!
//! Where a rendered notice ends up.
//!
//! ```text
//! InvoiceNotice ──► render::{subject, body} ──► SmtpSink  (STARTTLS relay)
//!                                          └──► LogSink   (tracing only)
//! ```

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use branchbook_core::InvoiceNotice;

use crate::error::{NotifyError, NotifyResult};
use crate::render;
use crate::settings::SmtpSettings;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notice: &InvoiceNotice) -> NotifyResult<()>;

    fn name(&self) -> &'static str;
}

// =============================================================================
// Log Sink
// =============================================================================

/// Logs the notice instead of sending it. Used when no SMTP relay is set.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notice: &InvoiceNotice) -> NotifyResult<()> {
        info!(
            to = %notice.recipient_email,
            subject = %render::subject(notice),
            invoice_id = %notice.invoice_id,
            grand_total = %notice.grand_total(),
            "Notification (log sink)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// =============================================================================
// SMTP Sink
// =============================================================================

pub struct SmtpSink {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSink {
    pub fn new(settings: &SmtpSettings) -> NotifyResult<Self> {
        let from: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .map_err(|e| NotifyError::Configuration(format!("Invalid from address: {e}")))?;

        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| NotifyError::Configuration(format!("Failed to create SMTP relay: {e}")))?
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(SmtpSink { from, transport })
    }

    fn build_message(&self, notice: &InvoiceNotice) -> NotifyResult<Message> {
        let to: Mailbox = notice
            .recipient_email
            .parse()
            .map_err(|e| NotifyError::InvalidAddress(format!("{}: {e}", notice.recipient_email)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(render::subject(notice))
            .header(ContentType::TEXT_PLAIN)
            .body(render::body(notice))
            .map_err(|e| NotifyError::Delivery(format!("Failed to build message: {e}")))
    }
}

#[async_trait]
impl NotificationSink for SmtpSink {
    async fn send(&self, notice: &InvoiceNotice) -> NotifyResult<()> {
        let message = self.build_message(notice)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Delivery(format!("Failed to send email: {e}")))?;

        info!(
            to = %notice.recipient_email,
            invoice_id = %notice.invoice_id,
            "Notification email sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
