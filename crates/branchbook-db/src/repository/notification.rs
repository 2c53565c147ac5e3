//! # Notification Outbox Repository
//!
//! Persisted queue of invoice notices waiting for delivery.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INVOICE OPERATION (create)                                             │
//! │       │                                                                 │
//! │       ├── 1. INSERT INTO invoices ...                                   │
//! │       ├── 2. link id into branch collection                             │
//! │       └── 3. INSERT INTO notification_outbox (payload = notice JSON)    │
//! │                                                                         │
//! │  BACKGROUND DISPATCHER (branchbook-notify)                              │
//! │       │                                                                 │
//! │       ├── SELECT due entries (delivered_at IS NULL,                     │
//! │       │                       next_attempt_at <= now,                   │
//! │       │                       attempts < max_attempts)                  │
//! │       ├── send                                                          │
//! │       ├── ok   → delivered_at = now                                     │
//! │       └── fail → attempts += 1, last_error, next_attempt_at = backoff   │
//! │                                                                         │
//! │  A failed send never reaches the invoice operation.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// A row of `notification_outbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: String,
    pub invoice_id: String,
    pub recipient: String,
    /// JSON document; its schema belongs to the notifier.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

const OUTBOX_COLUMNS: &str = r#"
    id, invoice_id, recipient, payload, attempts, last_error,
    created_at, next_attempt_at, attempted_at, delivered_at
"#;

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a notice. It is due immediately.
    pub async fn enqueue(
        &self,
        invoice_id: &str,
        recipient: &str,
        payload: &str,
    ) -> DbResult<OutboxEntry> {
        let now = Utc::now();
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            recipient: recipient.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            attempted_at: None,
            delivered_at: None,
        };

        debug!(
            entry_id = %entry.id,
            invoice_id = %invoice_id,
            "Queuing notification"
        );

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, invoice_id, recipient, payload, attempts, last_error,
                created_at, next_attempt_at, attempted_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.invoice_id)
        .bind(&entry.recipient)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.next_attempt_at)
        .bind(entry.attempted_at)
        .bind(entry.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Entries due at `now` with fewer than `max_attempts` attempts, oldest first.
    pub async fn get_due(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: u32,
    ) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox \
             WHERE delivered_at IS NULL AND next_attempt_at <= ?1 AND attempts < ?2 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?3"
        );
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(now)
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE id = ?1");
        let entry = sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE notification_outbox SET
                delivered_at = ?2,
                attempted_at = ?2,
                attempts = attempts + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        Ok(())
    }

    /// Records a failed attempt and when to try again.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3,
                next_attempt_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        Ok(())
    }

    /// Undelivered entries, including those not yet due.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Undelivered entries that will never be retried.
    pub async fn count_exhausted(&self, max_attempts: u32) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox \
             WHERE delivered_at IS NULL AND attempts >= ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes entries delivered before `cutoff`. Returns the number removed.
    pub async fn cleanup_delivered(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notification_outbox \
             WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
