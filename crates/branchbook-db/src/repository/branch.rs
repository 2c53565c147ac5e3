//! # Branch Repository
//!
//! Branches carry two denormalized invoice-id collections, stored as JSON
//! arrays:
//!
//! ```text
//! branches.sales_receipt_invoices = '["3f1c…", "9ab2…"]'
//! branches.expense_invoices       = '["c07e…"]'
//! ```
//!
//! The repository stores whatever collection it is given. Keeping it in step
//! with the invoice table is the back-reference coordinator's job.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use branchbook_core::{Branch, BranchAddress};

/// Row shape of the `branches` table.
#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: String,
    branch_name: String,
    branch_phone_number: Option<String>,
    country: Option<String>,
    province: Option<String>,
    district: Option<String>,
    street: Option<String>,
    branch_staff: Option<String>,
    sales_receipt_invoices: String,
    expense_invoices: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BranchRow> for Branch {
    type Error = DbError;

    fn try_from(row: BranchRow) -> DbResult<Self> {
        Ok(Branch {
            id: row.id,
            branch_name: row.branch_name,
            branch_phone_number: row.branch_phone_number,
            address: BranchAddress {
                country: row.country,
                province: row.province,
                district: row.district,
                street: row.street,
            },
            branch_staff: row.branch_staff,
            sales_receipt_invoices: serde_json::from_str(&row.sales_receipt_invoices)?,
            expense_invoices: serde_json::from_str(&row.expense_invoices)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for branch database operations.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            SELECT
                id, branch_name, branch_phone_number,
                country, province, district, street,
                branch_staff, sales_receipt_invoices, expense_invoices,
                created_at, updated_at
            FROM branches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Branch::try_from).transpose()
    }

    pub async fn insert(&self, branch: &Branch) -> DbResult<()> {
        debug!(branch_id = %branch.id, name = %branch.branch_name, "Inserting branch");

        sqlx::query(
            r#"
            INSERT INTO branches (
                id, branch_name, branch_phone_number,
                country, province, district, street,
                branch_staff, sales_receipt_invoices, expense_invoices,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.branch_name)
        .bind(&branch.branch_phone_number)
        .bind(&branch.address.country)
        .bind(&branch.address.province)
        .bind(&branch.address.district)
        .bind(&branch.address.street)
        .bind(&branch.branch_staff)
        .bind(serde_json::to_string(&branch.sales_receipt_invoices)?)
        .bind(serde_json::to_string(&branch.expense_invoices)?)
        .bind(branch.created_at)
        .bind(branch.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites every mutable column, including both invoice collections.
    pub async fn update(&self, branch: &Branch) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE branches SET
                branch_name = ?2,
                branch_phone_number = ?3,
                country = ?4,
                province = ?5,
                district = ?6,
                street = ?7,
                branch_staff = ?8,
                sales_receipt_invoices = ?9,
                expense_invoices = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.branch_name)
        .bind(&branch.branch_phone_number)
        .bind(&branch.address.country)
        .bind(&branch.address.province)
        .bind(&branch.address.district)
        .bind(&branch.address.street)
        .bind(&branch.branch_staff)
        .bind(serde_json::to_string(&branch.sales_receipt_invoices)?)
        .bind(serde_json::to_string(&branch.expense_invoices)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", &branch.id));
        }

        Ok(())
    }

    /// All branch ids, oldest first.
    pub async fn list_ids(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM branches ORDER BY created_at ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
