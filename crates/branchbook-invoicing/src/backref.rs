//! # Branch Back-Reference Coordinator
//!
//! Keeps `Branch::sales_receipt_invoices` / `Branch::expense_invoices` in
//! step with the invoice table.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  invoices (source of truth)         branches (derived index)         │
//! │  ──────────────────────────         ────────────────────────         │
//! │  id │ kind │ branch_id              sales_receipt_invoices: [ids]    │
//! │  ───┼──────┼──────────    link ──►  expense_invoices:       [ids]    │
//! │  a  │ sr   │ b1                                                      │
//! │  b  │ exp  │ b1         reconcile ◄── rebuild from invoice table     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Appends re-read the branch first and skip ids already present, so a retry
//! or two interleaved creates never duplicate an entry. Anything lost to a
//! concurrent write is restored by [`BackrefCoordinator::reconcile_branch`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use branchbook_core::{Branch, InvoiceKind};

use crate::error::{InvoicingError, InvoicingResult};
use crate::store::{BranchStore, InvoiceStore};

/// Outcome of rebuilding one branch's collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub branch_id: String,
    /// Ids present in the invoice table but missing from the branch.
    pub added_sales_receipts: Vec<String>,
    pub added_expenses: Vec<String>,
    /// Ids listed on the branch with no matching invoice.
    pub removed_sales_receipts: Vec<String>,
    pub removed_expenses: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.added_sales_receipts.is_empty()
            && self.added_expenses.is_empty()
            && self.removed_sales_receipts.is_empty()
            && self.removed_expenses.is_empty()
    }

    fn record(&mut self, kind: InvoiceKind, added: Vec<String>, removed: Vec<String>) {
        match kind {
            InvoiceKind::SalesReceipt => {
                self.added_sales_receipts = added;
                self.removed_sales_receipts = removed;
            }
            InvoiceKind::Expense => {
                self.added_expenses = added;
                self.removed_expenses = removed;
            }
        }
    }
}

#[derive(Clone)]
pub struct BackrefCoordinator {
    branches: Arc<dyn BranchStore>,
    invoices: Arc<dyn InvoiceStore>,
}

impl BackrefCoordinator {
    pub fn new(branches: Arc<dyn BranchStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        BackrefCoordinator { branches, invoices }
    }

    /// Appends `invoice_id` to the branch collection for `kind`.
    ///
    /// Returns `false` when the id was already there.
    pub async fn link_invoice(
        &self,
        branch_id: &str,
        invoice_id: &str,
        kind: InvoiceKind,
    ) -> InvoicingResult<bool> {
        let mut branch = self.load_branch(branch_id).await?;

        let ids = branch.invoice_ids_mut(kind);
        if ids.iter().any(|id| id == invoice_id) {
            debug!(branch_id, invoice_id, %kind, "Invoice already linked");
            return Ok(false);
        }
        ids.push(invoice_id.to_string());

        self.branches.save(&branch).await?;
        debug!(branch_id, invoice_id, %kind, "Invoice linked to branch");
        Ok(true)
    }

    /// Removes `invoice_id` from the branch collection for `kind`.
    ///
    /// Returns `false` when the id was not listed.
    pub async fn unlink_invoice(
        &self,
        branch_id: &str,
        invoice_id: &str,
        kind: InvoiceKind,
    ) -> InvoicingResult<bool> {
        let mut branch = self.load_branch(branch_id).await?;

        let ids = branch.invoice_ids_mut(kind);
        let before = ids.len();
        ids.retain(|id| id != invoice_id);
        if ids.len() == before {
            return Ok(false);
        }

        self.branches.save(&branch).await?;
        debug!(branch_id, invoice_id, %kind, "Invoice unlinked from branch");
        Ok(true)
    }

    /// Rebuilds both collections of a branch from the invoice table.
    ///
    /// The rebuilt collections follow invoice creation order. The branch is
    /// only written when something changed.
    pub async fn reconcile_branch(&self, branch_id: &str) -> InvoicingResult<ReconcileReport> {
        let mut branch = self.load_branch(branch_id).await?;
        let mut report = ReconcileReport {
            branch_id: branch_id.to_string(),
            ..Default::default()
        };
        let mut changed = false;

        for kind in InvoiceKind::ALL {
            let actual = self.invoices.ids_for_branch(kind, branch_id).await?;
            let listed = branch.invoice_ids(kind);

            let added: Vec<String> = actual
                .iter()
                .filter(|id| !listed.contains(id))
                .cloned()
                .collect();
            let removed: Vec<String> = listed
                .iter()
                .filter(|id| !actual.contains(id))
                .cloned()
                .collect();

            if *listed != actual {
                changed = true;
                *branch.invoice_ids_mut(kind) = actual;
            }
            report.record(kind, added, removed);
        }

        if changed {
            self.branches.save(&branch).await?;
            info!(
                branch_id,
                added = report.added_sales_receipts.len() + report.added_expenses.len(),
                removed = report.removed_sales_receipts.len() + report.removed_expenses.len(),
                "Branch invoice collections rebuilt"
            );
        }

        Ok(report)
    }

    /// Reconciles every branch, in store order.
    pub async fn reconcile_all(&self) -> InvoicingResult<Vec<ReconcileReport>> {
        let ids = self.branches.list_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.reconcile_branch(&id).await?);
        }
        Ok(reports)
    }

    async fn load_branch(&self, branch_id: &str) -> InvoicingResult<Branch> {
        self.branches
            .find(branch_id)
            .await?
            .ok_or_else(|| InvoicingError::not_found("Branch", branch_id))
    }
}
