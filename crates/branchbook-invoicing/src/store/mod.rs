//! # Store Contracts
//!
//! The invoicing services only see these traits. The SQLite repositories of
//! `branchbook-db` implement them in [`sqlite`]; tests swap in wrappers that
//! fail on demand.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────────────────────────┐
//! │ InvoiceLifecycle │────►│ Stores                                   │
//! │ StaffDirectory   │     │  identities: Arc<dyn IdentityStore>      │
//! │ BackrefCoordinator│    │  branches:   Arc<dyn BranchStore>        │
//! └──────────────────┘     │  catalog:    Arc<dyn CatalogStore>       │
//!                          │  invoices:   Arc<dyn InvoiceStore>       │
//!                          │  notices:    Arc<dyn NoticeQueue>        │
//!                          └──────────────────────────────────────────┘
//! ```
//!
//! Identifier syntax is checked by the callers before any of these run.

use std::sync::Arc;

use async_trait::async_trait;

use branchbook_core::{Branch, CatalogItem, Invoice, InvoiceKind, InvoiceNotice, Worker};
use branchbook_db::Database;

use crate::error::InvoicingResult;

pub mod sqlite;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Worker>>;
    async fn find_by_branch(&self, branch_id: &str, limit: u32) -> InvoicingResult<Vec<Worker>>;
    async fn find_all(&self, limit: u32) -> InvoicingResult<Vec<Worker>>;
    /// Persists profile fields of an existing worker.
    async fn save(&self, worker: &Worker) -> InvoicingResult<()>;
}

#[async_trait]
pub trait BranchStore: Send + Sync {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Branch>>;
    async fn save(&self, branch: &Branch) -> InvoicingResult<()>;
    async fn list_ids(&self) -> InvoicingResult<Vec<String>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find(&self, product_id: &str) -> InvoicingResult<Option<CatalogItem>>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Invoice>>;
    async fn find_by_reference_number(
        &self,
        kind: InvoiceKind,
        reference_number: &str,
    ) -> InvoicingResult<Option<Invoice>>;
    async fn find_by_branch(
        &self,
        kind: InvoiceKind,
        branch_id: &str,
        limit: u32,
    ) -> InvoicingResult<Vec<Invoice>>;
    async fn find_all(&self, kind: InvoiceKind, limit: u32) -> InvoicingResult<Vec<Invoice>>;
    /// Every id owned by the branch, creation order.
    async fn ids_for_branch(&self, kind: InvoiceKind, branch_id: &str)
        -> InvoicingResult<Vec<String>>;
    /// Inserts; a taken `(kind, reference_number)` is `Conflict`.
    async fn create(&self, invoice: &Invoice) -> InvoicingResult<()>;
    async fn save(&self, invoice: &Invoice) -> InvoicingResult<()>;
    /// Removes; an absent id is `NotFound`.
    async fn delete(&self, id: &str) -> InvoicingResult<()>;
}

#[async_trait]
pub trait NoticeQueue: Send + Sync {
    async fn enqueue(&self, notice: &InvoiceNotice) -> InvoicingResult<()>;
}

/// Every store the invoicing services need, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub branches: Arc<dyn BranchStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub invoices: Arc<dyn InvoiceStore>,
    pub notices: Arc<dyn NoticeQueue>,
}

impl Stores {
    /// Wires every contract to the SQLite repositories of `db`.
    pub fn sqlite(db: &Database) -> Self {
        Stores {
            identities: Arc::new(db.workers()),
            branches: Arc::new(db.branches()),
            catalog: Arc::new(db.products()),
            invoices: Arc::new(db.invoices()),
            notices: Arc::new(db.notification_outbox()),
        }
    }
}
