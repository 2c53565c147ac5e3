//! SQLite implementations of the store contracts.
//!
//! Thin adapters: each method forwards to the matching repository call and
//! converts `DbError` into `InvoicingError`.

use async_trait::async_trait;

use branchbook_core::{Branch, CatalogItem, Invoice, InvoiceKind, InvoiceNotice, Worker};
use branchbook_db::{
    BranchRepository, InvoiceRepository, NotificationOutboxRepository, ProductRepository,
    WorkerRepository,
};

use super::{BranchStore, CatalogStore, IdentityStore, InvoiceStore, NoticeQueue};
use crate::error::{InvoicingError, InvoicingResult};

#[async_trait]
impl IdentityStore for WorkerRepository {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Worker>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn find_by_branch(&self, branch_id: &str, limit: u32) -> InvoicingResult<Vec<Worker>> {
        Ok(self.list_by_branch(branch_id, limit).await?)
    }

    async fn find_all(&self, limit: u32) -> InvoicingResult<Vec<Worker>> {
        Ok(self.list_all(limit).await?)
    }

    async fn save(&self, worker: &Worker) -> InvoicingResult<()> {
        Ok(self.update_profile(worker).await?)
    }
}

#[async_trait]
impl BranchStore for BranchRepository {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Branch>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn save(&self, branch: &Branch) -> InvoicingResult<()> {
        Ok(self.update(branch).await?)
    }

    async fn list_ids(&self) -> InvoicingResult<Vec<String>> {
        Ok(BranchRepository::list_ids(self).await?)
    }
}

#[async_trait]
impl CatalogStore for ProductRepository {
    async fn find(&self, product_id: &str) -> InvoicingResult<Option<CatalogItem>> {
        Ok(self.get_by_id(product_id).await?)
    }
}

#[async_trait]
impl InvoiceStore for InvoiceRepository {
    async fn find(&self, id: &str) -> InvoicingResult<Option<Invoice>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn find_by_reference_number(
        &self,
        kind: InvoiceKind,
        reference_number: &str,
    ) -> InvoicingResult<Option<Invoice>> {
        Ok(self.get_by_reference_number(kind, reference_number).await?)
    }

    async fn find_by_branch(
        &self,
        kind: InvoiceKind,
        branch_id: &str,
        limit: u32,
    ) -> InvoicingResult<Vec<Invoice>> {
        Ok(self.list_by_branch(kind, branch_id, limit).await?)
    }

    async fn find_all(&self, kind: InvoiceKind, limit: u32) -> InvoicingResult<Vec<Invoice>> {
        Ok(self.list_all(kind, limit).await?)
    }

    async fn ids_for_branch(
        &self,
        kind: InvoiceKind,
        branch_id: &str,
    ) -> InvoicingResult<Vec<String>> {
        Ok(InvoiceRepository::ids_for_branch(self, kind, branch_id).await?)
    }

    async fn create(&self, invoice: &Invoice) -> InvoicingResult<()> {
        Ok(self.insert(invoice).await?)
    }

    async fn save(&self, invoice: &Invoice) -> InvoicingResult<()> {
        Ok(self.update(invoice).await?)
    }

    async fn delete(&self, id: &str) -> InvoicingResult<()> {
        Ok(InvoiceRepository::delete(self, id).await?)
    }
}

#[async_trait]
impl NoticeQueue for NotificationOutboxRepository {
    async fn enqueue(&self, notice: &InvoiceNotice) -> InvoicingResult<()> {
        let payload = serde_json::to_string(notice)
            .map_err(|e| InvoicingError::Delivery(e.to_string()))?;

        NotificationOutboxRepository::enqueue(
            self,
            &notice.invoice_id,
            &notice.recipient_email,
            &payload,
        )
        .await
        .map_err(|e| InvoicingError::Delivery(e.to_string()))?;

        Ok(())
    }
}
