//! # Invoice Repository
//!
//! Sales receipts and expense invoices share one table, discriminated by
//! `kind`.
//!
//! ## Storage Layout
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ invoices                                                             │
//! │  id ─────────────── storage key (UUID)                               │
//! │  kind ──┐                                                            │
//! │  reference_number ──┴── UNIQUE: the SR / Ref number race stops here  │
//! │  branch_id ──────── source of truth for branch membership            │
//! │  lines ──────────── JSON Vec<PricedLine>                             │
//! │  details ────────── JSON InvoiceDetails (tagged by kind)             │
//! │  subtotal / tax / grand_total ── integer cents                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use branchbook_core::{Invoice, InvoiceKind};

const INVOICE_COLUMNS: &str = r#"
    id, kind, reference_number, branch_id, created_by, lines,
    tax_rate_bps, subtotal_cents, tax_cents, grand_total_cents,
    details, created_at, updated_at
"#;

/// Row shape of the `invoices` table.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    reference_number: String,
    branch_id: String,
    created_by: String,
    lines: String,
    tax_rate_bps: u32,
    subtotal_cents: i64,
    tax_cents: i64,
    grand_total_cents: i64,
    details: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DbError;

    fn try_from(row: InvoiceRow) -> DbResult<Self> {
        Ok(Invoice {
            id: row.id,
            reference_number: row.reference_number,
            branch_id: row.branch_id,
            created_by: row.created_by,
            lines: serde_json::from_str(&row.lines)?,
            tax_rate_bps: row.tax_rate_bps,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            grand_total_cents: row.grand_total_cents,
            details: serde_json::from_str(&row.details)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rows_to_invoices(rows: Vec<InvoiceRow>) -> DbResult<Vec<Invoice>> {
    rows.into_iter().map(Invoice::try_from).collect()
}

/// Names the duplicate reference number instead of the raw constraint text.
fn map_unique(err: sqlx::Error, invoice: &Invoice) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate(
            invoice.kind().reference_label(),
            invoice.reference_number.clone(),
        ),
        other => other,
    }
}

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Invoice::try_from).transpose()
    }

    pub async fn get_by_reference_number(
        &self,
        kind: InvoiceKind,
        reference_number: &str,
    ) -> DbResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE kind = ?1 AND reference_number = ?2"
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(kind)
            .bind(reference_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Invoice::try_from).transpose()
    }

    /// Invoices of `kind` owned by `branch_id`, oldest first, at most `limit`.
    pub async fn list_by_branch(
        &self,
        kind: InvoiceKind,
        branch_id: &str,
        limit: u32,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE kind = ?1 AND branch_id = ?2 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?3"
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(kind)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows_to_invoices(rows)
    }

    pub async fn list_all(&self, kind: InvoiceKind, limit: u32) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE kind = ?1 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(kind)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows_to_invoices(rows)
    }

    /// Every id of `kind` owned by `branch_id`, in creation order. Unbounded:
    /// this is the source used to rebuild a branch's collection.
    pub async fn ids_for_branch(&self, kind: InvoiceKind, branch_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM invoices WHERE kind = ?1 AND branch_id = ?2 \
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(kind)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Inserts a new invoice.
    ///
    /// ## Errors
    /// `UniqueViolation` when `(kind, reference_number)` is taken.
    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(
            invoice_id = %invoice.id,
            kind = %invoice.kind(),
            reference_number = %invoice.reference_number,
            "Inserting invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, kind, reference_number, branch_id, created_by, lines,
                tax_rate_bps, subtotal_cents, tax_cents, grand_total_cents,
                details, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&invoice.id)
        .bind(invoice.kind())
        .bind(&invoice.reference_number)
        .bind(&invoice.branch_id)
        .bind(&invoice.created_by)
        .bind(serde_json::to_string(&invoice.lines)?)
        .bind(invoice.tax_rate_bps)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.grand_total_cents)
        .bind(serde_json::to_string(&invoice.details)?)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, invoice))?;

        Ok(())
    }

    /// Overwrites the mutable columns of an existing invoice.
    ///
    /// `kind`, `branch_id`, `created_by` and `created_at` never change.
    pub async fn update(&self, invoice: &Invoice) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                reference_number = ?2,
                lines = ?3,
                tax_rate_bps = ?4,
                subtotal_cents = ?5,
                tax_cents = ?6,
                grand_total_cents = ?7,
                details = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.reference_number)
        .bind(serde_json::to_string(&invoice.lines)?)
        .bind(invoice.tax_rate_bps)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.grand_total_cents)
        .bind(serde_json::to_string(&invoice.details)?)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, invoice))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", &invoice.id));
        }

        Ok(())
    }

    /// Removes an invoice. `NotFound` when no row matched.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        debug!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    pub async fn count(&self, kind: InvoiceKind) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE kind = ?1")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_branch, sample_invoice, sample_worker};
    use crate::{Database, DbConfig};
    use branchbook_core::{Branch, Role, Worker};

    async fn setup() -> (Database, Branch, Worker) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let branch = sample_branch("Bhaktapur");
        db.branches().insert(&branch).await.unwrap();
        let admin = sample_worker(Role::Admin, None, "admin@example.com");
        db.workers().insert(&admin).await.unwrap();
        (db, branch, admin)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (db, branch, admin) = setup().await;
        let invoice = sample_invoice(&branch.id, &admin.id, "SR-1");
        db.invoices().insert(&invoice).await.unwrap();

        let by_id = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(by_id, invoice);

        let by_ref = db
            .invoices()
            .get_by_reference_number(InvoiceKind::SalesReceipt, "SR-1")
            .await
            .unwrap();
        assert_eq!(by_ref.map(|i| i.id), Some(invoice.id.clone()));

        let other_kind = db
            .invoices()
            .get_by_reference_number(InvoiceKind::Expense, "SR-1")
            .await
            .unwrap();
        assert!(other_kind.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_number() {
        let (db, branch, admin) = setup().await;
        db.invoices()
            .insert(&sample_invoice(&branch.id, &admin.id, "SR-9"))
            .await
            .unwrap();

        let err = db
            .invoices()
            .insert(&sample_invoice(&branch.id, &admin.id, "SR-9"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.invoices().count(InvoiceKind::SalesReceipt).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_branch_is_foreign_key_violation() {
        let (db, _branch, admin) = setup().await;
        let err = db
            .invoices()
            .insert(&sample_invoice("no-such-branch", &admin.id, "SR-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_listing_caps_and_orders() {
        let (db, branch, admin) = setup().await;
        let mut ids = Vec::new();
        for i in 0..15 {
            let invoice = sample_invoice(&branch.id, &admin.id, &format!("SR-{i}"));
            ids.push(invoice.id.clone());
            db.invoices().insert(&invoice).await.unwrap();
        }

        let page = db
            .invoices()
            .list_by_branch(InvoiceKind::SalesReceipt, &branch.id, 10)
            .await
            .unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].id, ids[0]);

        assert_eq!(
            db.invoices().list_all(InvoiceKind::SalesReceipt, 10).await.unwrap().len(),
            10
        );
        assert!(db.invoices().list_all(InvoiceKind::Expense, 10).await.unwrap().is_empty());
        assert_eq!(
            db.invoices()
                .ids_for_branch(InvoiceKind::SalesReceipt, &branch.id)
                .await
                .unwrap(),
            ids
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, branch, admin) = setup().await;
        let mut invoice = sample_invoice(&branch.id, &admin.id, "SR-5");
        db.invoices().insert(&invoice).await.unwrap();

        invoice.reference_number = "SR-6".to_string();
        invoice.tax_rate_bps = 500;
        db.invoices().update(&invoice).await.unwrap();
        let found = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(found.reference_number, "SR-6");
        assert_eq!(found.tax_rate_bps, 500);

        db.invoices().delete(&invoice.id).await.unwrap();
        assert!(db.invoices().get_by_id(&invoice.id).await.unwrap().is_none());
        assert!(matches!(
            db.invoices().delete(&invoice.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
