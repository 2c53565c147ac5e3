//! # Worker Repository
//!
//! Workers are seeded or onboarded elsewhere. This repository reads them and
//! persists profile edits; nothing here deletes a worker.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use branchbook_core::Worker;

const WORKER_COLUMNS: &str = r#"
    id, role, branch_id, full_name, email, phone_number, address,
    created_at, updated_at
"#;

/// Repository for worker database operations.
#[derive(Debug, Clone)]
pub struct WorkerRepository {
    pool: SqlitePool,
}

impl WorkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WorkerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Worker>> {
        let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = ?1");
        let worker = sqlx::query_as::<_, Worker>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(worker)
    }

    /// Workers assigned to `branch_id`, oldest first, at most `limit`.
    pub async fn list_by_branch(&self, branch_id: &str, limit: u32) -> DbResult<Vec<Worker>> {
        let sql = format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE branch_id = ?1 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?2"
        );
        let workers = sqlx::query_as::<_, Worker>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(workers)
    }

    pub async fn list_all(&self, limit: u32) -> DbResult<Vec<Worker>> {
        let sql = format!(
            "SELECT {WORKER_COLUMNS} FROM workers ORDER BY created_at ASC, rowid ASC LIMIT ?1"
        );
        let workers = sqlx::query_as::<_, Worker>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(workers)
    }

    pub async fn insert(&self, worker: &Worker) -> DbResult<()> {
        debug!(worker_id = %worker.id, role = %worker.role, "Inserting worker");

        sqlx::query(
            r#"
            INSERT INTO workers (
                id, role, branch_id, full_name, email, phone_number, address,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&worker.id)
        .bind(worker.role)
        .bind(&worker.branch_id)
        .bind(&worker.full_name)
        .bind(&worker.email)
        .bind(&worker.phone_number)
        .bind(&worker.address)
        .bind(worker.created_at)
        .bind(worker.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persists profile fields. Role and branch assignment are not touched.
    pub async fn update_profile(&self, worker: &Worker) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workers SET
                full_name = ?2,
                email = ?3,
                phone_number = ?4,
                address = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&worker.id)
        .bind(&worker.full_name)
        .bind(&worker.email)
        .bind(&worker.phone_number)
        .bind(&worker.address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Worker", &worker.id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
