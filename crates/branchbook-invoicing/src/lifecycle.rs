//! # Invoice Lifecycle Manager
//!
//! Create, update, read, list and delete for sales receipts and expenses.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ 1. ids + header + lines validated       ── fail fast, no store touched  │
//! │ 2. actor resolved, CreateInvoice checked against the target branch     │
//! │ 3. branch resolved                                                      │
//! │ 4. reference number unused for this kind ── Conflict                    │
//! │ 5. unit prices resolved in input order  ── catalog NotFound             │
//! │ 6. priced (core::pricing)                                               │
//! │ 7. invoice stored                       ── failure aborts               │
//! │ 8. linked to branch                     ── failure = degraded success   │
//! │ 9. notices queued, one per recipient    ── failure = degraded success   │
//! │10. hydrated with branch + author summaries                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary fields are only ever produced by the pricer. An update that
//! touches a line or the tax rate reprices the whole line collection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use branchbook_core::validation::{validate_new_invoice, validate_patch, validate_patch_fields};
use branchbook_core::{
    price, Action, Branch, BranchSummary, Invoice, InvoiceDetails, InvoiceKind, InvoiceNotice,
    InvoicePatch, LineItem, LinePatch, ItemRef, Money, NewInvoice, PricedTotals, ResolvedLine,
    TaxRate, ValidationError, Worker, WorkerSummary,
};

use crate::backref::{BackrefCoordinator, ReconcileReport};
use crate::error::{InvoicingError, InvoicingResult};
use crate::identity::{check_id, IdentityResolver};
use crate::settings::InvoicingSettings;
use crate::store::Stores;

// =============================================================================
// Results
// =============================================================================

/// An invoice joined with summaries of its branch and author.
///
/// Either summary is `None` when the referenced record no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedInvoice {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub branch: Option<BranchSummary>,
    pub author: Option<WorkerSummary>,
}

/// A side effect that failed after the invoice was stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Degradation {
    BranchLinkFailed { branch_id: String, reason: String },
    NotificationQueueFailed { recipient: String, reason: String },
}

/// Result of a create. The invoice exists even when `degraded` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Created {
    pub invoice: HydratedInvoice,
    pub degraded: Vec<Degradation>,
}

impl Created {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Clone)]
pub struct InvoiceLifecycle {
    stores: Stores,
    resolver: IdentityResolver,
    backrefs: BackrefCoordinator,
    settings: InvoicingSettings,
}

impl InvoiceLifecycle {
    pub fn new(stores: Stores, settings: InvoicingSettings) -> Self {
        let resolver = IdentityResolver::new(
            Arc::clone(&stores.identities),
            Arc::clone(&stores.branches),
        );
        let backrefs =
            BackrefCoordinator::new(Arc::clone(&stores.branches), Arc::clone(&stores.invoices));

        InvoiceLifecycle {
            stores,
            resolver,
            backrefs,
            settings,
        }
    }

    pub fn backrefs(&self) -> &BackrefCoordinator {
        &self.backrefs
    }

    pub fn settings(&self) -> &InvoicingSettings {
        &self.settings
    }

    /// Creates an invoice of the kind given by `input.details` on `branch_id`.
    pub async fn create(
        &self,
        actor_id: &str,
        branch_id: &str,
        input: NewInvoice,
    ) -> InvoicingResult<Created> {
        check_id("actor_id", actor_id)?;
        check_id("branch_id", branch_id)?;
        validate_new_invoice(&input)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver
            .ensure(&actor, Action::CreateInvoice, Some(branch_id))?;
        let branch = self.resolver.resolve_branch(branch_id).await?;

        let kind = input.details.kind();
        self.ensure_reference_free(kind, &input.reference_number, None)
            .await?;

        let mut resolved = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            resolved.push(self.resolve_line(line).await?);
        }
        let totals = price(&resolved, TaxRate::from_bps(input.tax_rate_bps))?;

        let mut details = input.details;
        if let InvoiceDetails::SalesReceipt(d) = &mut details {
            if d.mobile_number.is_none() {
                d.mobile_number = branch.branch_phone_number.clone();
            }
        }

        let now = Utc::now();
        let mut invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            reference_number: input.reference_number,
            branch_id: branch.id.clone(),
            created_by: actor.id.clone(),
            lines: Vec::new(),
            tax_rate_bps: input.tax_rate_bps,
            subtotal_cents: 0,
            tax_cents: 0,
            grand_total_cents: 0,
            details,
            created_at: now,
            updated_at: now,
        };
        apply_totals(&mut invoice, totals);

        self.stores.invoices.create(&invoice).await?;
        info!(
            invoice_id = %invoice.id,
            %kind,
            reference_number = %invoice.reference_number,
            branch_id = %branch.id,
            grand_total = %invoice.grand_total(),
            "Invoice created"
        );

        let mut degraded = Vec::new();

        if let Err(e) = self
            .backrefs
            .link_invoice(&branch.id, &invoice.id, kind)
            .await
        {
            warn!(invoice_id = %invoice.id, branch_id = %branch.id, error = %e, "Branch link failed");
            degraded.push(Degradation::BranchLinkFailed {
                branch_id: branch.id.clone(),
                reason: e.to_string(),
            });
        }

        let notices = InvoiceNotice::for_invoice(&invoice, &branch, &actor);
        if notices.is_empty() {
            debug!(invoice_id = %invoice.id, "No recipient email, no notification");
        }
        for notice in &notices {
            if let Err(e) = self.stores.notices.enqueue(notice).await {
                warn!(
                    invoice_id = %invoice.id,
                    recipient = %notice.recipient_email,
                    error = %e,
                    "Notification not queued"
                );
                degraded.push(Degradation::NotificationQueueFailed {
                    recipient: notice.recipient_email.clone(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(Created {
            invoice: HydratedInvoice {
                invoice,
                branch: Some(BranchSummary::from(&branch)),
                author: Some(WorkerSummary::from(&actor)),
            },
            degraded,
        })
    }

    /// Applies the fields present in `patch`. Absent fields keep their value.
    ///
    /// Applying the same patch twice leaves the stored invoice unchanged.
    pub async fn update(
        &self,
        actor_id: &str,
        invoice_id: &str,
        patch: InvoicePatch,
    ) -> InvoicingResult<HydratedInvoice> {
        check_id("actor_id", actor_id)?;
        check_id("invoice_id", invoice_id)?;
        validate_patch_fields(&patch)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver.ensure_role(&actor, Action::UpdateInvoice)?;
        let current = self.load_invoice(invoice_id).await?;
        self.resolver
            .ensure(&actor, Action::UpdateInvoice, Some(&current.branch_id))?;

        let kind = current.kind();
        validate_patch(kind, &patch)?;

        let mut next = current.clone();

        if let Some(reference) = &patch.reference_number {
            if *reference != current.reference_number {
                self.ensure_reference_free(kind, reference, Some(current.id.as_str()))
                    .await?;
                next.reference_number = reference.clone();
            }
        }

        apply_details(&mut next.details, &patch);

        if patch.touches_pricing() {
            let tax_rate_bps = patch.tax_rate_bps.unwrap_or(current.tax_rate_bps);
            let resolved = self.reprice_lines(&current, patch.line.as_ref()).await?;
            let totals = price(&resolved, TaxRate::from_bps(tax_rate_bps))?;
            next.tax_rate_bps = tax_rate_bps;
            apply_totals(&mut next, totals);
        }

        if next == current {
            debug!(invoice_id, "Update changed nothing");
            return self.hydrate(current).await;
        }

        next.updated_at = Utc::now();
        self.stores.invoices.save(&next).await?;
        info!(
            invoice_id,
            %kind,
            repriced = patch.touches_pricing(),
            grand_total = %next.grand_total(),
            "Invoice updated"
        );

        self.hydrate(next).await
    }

    pub async fn get(&self, actor_id: &str, invoice_id: &str) -> InvoicingResult<HydratedInvoice> {
        check_id("actor_id", actor_id)?;
        check_id("invoice_id", invoice_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver.ensure_role(&actor, Action::ReadInvoice)?;
        let invoice = self.load_invoice(invoice_id).await?;
        self.resolver
            .ensure(&actor, Action::ReadInvoice, Some(&invoice.branch_id))?;

        self.hydrate(invoice).await
    }

    /// Invoices of `kind` on one branch, oldest first, at most the page cap.
    pub async fn list_by_branch(
        &self,
        actor_id: &str,
        kind: InvoiceKind,
        branch_id: &str,
    ) -> InvoicingResult<Vec<HydratedInvoice>> {
        check_id("actor_id", actor_id)?;
        check_id("branch_id", branch_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver
            .ensure(&actor, Action::ListBranchInvoices, Some(branch_id))?;
        let branch = self.resolver.resolve_branch(branch_id).await?;

        let invoices = self
            .stores
            .invoices
            .find_by_branch(kind, branch_id, self.settings.list_page_cap)
            .await?;

        let mut branches = HashMap::from([(branch.id.clone(), Some(branch))]);
        self.hydrate_all(invoices, &mut branches).await
    }

    /// Invoices of `kind` across every branch, oldest first, at most the page cap.
    pub async fn list_all(
        &self,
        actor_id: &str,
        kind: InvoiceKind,
    ) -> InvoicingResult<Vec<HydratedInvoice>> {
        check_id("actor_id", actor_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver.ensure(&actor, Action::ListAllInvoices, None)?;

        let invoices = self
            .stores
            .invoices
            .find_all(kind, self.settings.list_page_cap)
            .await?;

        self.hydrate_all(invoices, &mut HashMap::new()).await
    }

    /// Removes an invoice. The branch collection is only touched when
    /// `unlink_on_delete` is set.
    pub async fn delete(&self, actor_id: &str, invoice_id: &str) -> InvoicingResult<()> {
        check_id("actor_id", actor_id)?;
        check_id("invoice_id", invoice_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver.ensure(&actor, Action::DeleteInvoice, None)?;

        let invoice = self.load_invoice(invoice_id).await?;
        self.stores.invoices.delete(invoice_id).await?;
        info!(invoice_id, kind = %invoice.kind(), branch_id = %invoice.branch_id, "Invoice deleted");

        if self.settings.unlink_on_delete {
            if let Err(e) = self
                .backrefs
                .unlink_invoice(&invoice.branch_id, invoice_id, invoice.kind())
                .await
            {
                warn!(invoice_id, branch_id = %invoice.branch_id, error = %e, "Branch unlink failed");
            }
        }

        Ok(())
    }

    /// Rebuilds a branch's invoice collections. Admin only.
    pub async fn reconcile(
        &self,
        actor_id: &str,
        branch_id: &str,
    ) -> InvoicingResult<ReconcileReport> {
        check_id("actor_id", actor_id)?;
        check_id("branch_id", branch_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver
            .ensure(&actor, Action::ReconcileBranch, Some(branch_id))?;
        self.resolver.resolve_branch(branch_id).await?;

        self.backrefs.reconcile_branch(branch_id).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load_invoice(&self, invoice_id: &str) -> InvoicingResult<Invoice> {
        self.stores
            .invoices
            .find(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::not_found("Invoice", invoice_id))
    }

    /// Fails with `Conflict` when another invoice of `kind` holds `reference`.
    async fn ensure_reference_free(
        &self,
        kind: InvoiceKind,
        reference: &str,
        except_id: Option<&str>,
    ) -> InvoicingResult<()> {
        match self
            .stores
            .invoices
            .find_by_reference_number(kind, reference)
            .await?
        {
            Some(existing) if Some(existing.id.as_str()) != except_id => {
                Err(InvoicingError::Conflict {
                    field: kind.reference_label().to_string(),
                    value: reference.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Resolves the unit price of one submitted line.
    ///
    /// Catalog lines take the catalog price; expense lines carry their own.
    async fn resolve_line(&self, line: &LineItem) -> InvoicingResult<ResolvedLine> {
        let (name, unit_price) = match &line.item {
            ItemRef::Catalog { product_id } => {
                let product = self
                    .stores
                    .catalog
                    .find(product_id)
                    .await?
                    .ok_or_else(|| InvoicingError::not_found("Product", product_id.as_str()))?;
                (product.name.clone(), product.price())
            }
            ItemRef::Expense {
                name,
                unit_price_cents,
                ..
            } => (name.clone(), Money::from_cents(*unit_price_cents)),
        };

        Ok(ResolvedLine {
            item: line.item.clone(),
            name,
            quantity: line.quantity,
            unit_price,
            discount: Money::from_cents(line.discount_cents),
        })
    }

    /// The full line collection for repricing.
    ///
    /// Untouched lines keep their snapshot price. The patched line is
    /// resolved again.
    async fn reprice_lines(
        &self,
        invoice: &Invoice,
        patch: Option<&LinePatch>,
    ) -> InvoicingResult<Vec<ResolvedLine>> {
        let mut resolved: Vec<ResolvedLine> = invoice
            .lines
            .iter()
            .map(|line| ResolvedLine {
                item: line.item.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: Money::from_cents(line.unit_price_cents),
                discount: Money::from_cents(line.discount_cents),
            })
            .collect();

        if let Some(patch) = patch {
            let Some(existing) = invoice.lines.get(patch.position) else {
                return Err(ValidationError::OutOfRange {
                    field: "line.position".to_string(),
                    min: 0,
                    max: invoice.lines.len() as i64 - 1,
                }
                .into());
            };

            let line = LineItem {
                item: patch.item.clone().unwrap_or_else(|| existing.item.clone()),
                quantity: patch.quantity.unwrap_or(existing.quantity),
                discount_cents: patch.discount_cents.unwrap_or(existing.discount_cents),
            };
            resolved[patch.position] = self.resolve_line(&line).await?;
        }

        Ok(resolved)
    }

    async fn hydrate(&self, invoice: Invoice) -> InvoicingResult<HydratedInvoice> {
        let branch = self.stores.branches.find(&invoice.branch_id).await?;
        let author = self.stores.identities.find(&invoice.created_by).await?;

        Ok(HydratedInvoice {
            branch: branch.as_ref().map(BranchSummary::from),
            author: author.as_ref().map(WorkerSummary::from),
            invoice,
        })
    }

    /// Hydrates a page, loading each distinct branch and author once.
    async fn hydrate_all(
        &self,
        invoices: Vec<Invoice>,
        branches: &mut HashMap<String, Option<Branch>>,
    ) -> InvoicingResult<Vec<HydratedInvoice>> {
        let mut authors: HashMap<String, Option<Worker>> = HashMap::new();
        let mut hydrated = Vec::with_capacity(invoices.len());

        for invoice in invoices {
            if !branches.contains_key(&invoice.branch_id) {
                let branch = self.stores.branches.find(&invoice.branch_id).await?;
                branches.insert(invoice.branch_id.clone(), branch);
            }
            if !authors.contains_key(&invoice.created_by) {
                let author = self.stores.identities.find(&invoice.created_by).await?;
                authors.insert(invoice.created_by.clone(), author);
            }

            hydrated.push(HydratedInvoice {
                branch: branches
                    .get(&invoice.branch_id)
                    .and_then(Option::as_ref)
                    .map(BranchSummary::from),
                author: authors
                    .get(&invoice.created_by)
                    .and_then(Option::as_ref)
                    .map(WorkerSummary::from),
                invoice,
            });
        }

        Ok(hydrated)
    }
}

fn apply_totals(invoice: &mut Invoice, totals: PricedTotals) {
    invoice.lines = totals.lines;
    invoice.subtotal_cents = totals.subtotal.cents();
    invoice.tax_cents = totals.tax.cents();
    invoice.grand_total_cents = totals.grand_total.cents();
}

/// Copies the whitelisted header fields present in `patch`.
///
/// Fields of the other kind were already rejected by `validate_patch`.
fn apply_details(details: &mut InvoiceDetails, patch: &InvoicePatch) {
    fn set<T: Clone>(target: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *target = v.clone();
        }
    }
    fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            *target = value.clone();
        }
    }

    match details {
        InvoiceDetails::SalesReceipt(d) => {
            set(&mut d.customer_name, &patch.customer_name);
            set_opt(&mut d.date, &patch.date);
            set_opt(&mut d.payment_method, &patch.payment_method);
            set_opt(&mut d.description, &patch.description);
            set_opt(&mut d.message_to_customer, &patch.message_to_customer);
            set_opt(&mut d.message_to_statement, &patch.message_to_statement);
        }
        InvoiceDetails::Expense(d) => {
            set_opt(&mut d.payer_name, &patch.payer_name);
            set(&mut d.type_of_expense, &patch.type_of_expense);
            set_opt(&mut d.payment_method, &patch.payment_method);
            set_opt(&mut d.description, &patch.description);
            set_opt(&mut d.message_on_statement, &patch.message_on_statement);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{BranchStore, InvoiceStore, NoticeQueue};
    use crate::test_support::{
        catalog_line, expense, expense_line, fixture, sales_receipt, Fixture,
    };
    use async_trait::async_trait;
    use branchbook_core::{CoreError, DenyReason};

    const UNKNOWN: &str = "550e8400-e29b-41d4-a716-446655440000";

    struct FailingBranchSaves(Arc<dyn BranchStore>);

    #[async_trait]
    impl BranchStore for FailingBranchSaves {
        async fn find(&self, id: &str) -> InvoicingResult<Option<Branch>> {
            self.0.find(id).await
        }

        async fn save(&self, _branch: &Branch) -> InvoicingResult<()> {
            Err(InvoicingError::Persistence("database is locked".to_string()))
        }

        async fn list_ids(&self) -> InvoicingResult<Vec<String>> {
            self.0.list_ids().await
        }
    }

    struct FailingNotices;

    #[async_trait]
    impl NoticeQueue for FailingNotices {
        async fn enqueue(&self, _notice: &InvoiceNotice) -> InvoicingResult<()> {
            Err(InvoicingError::Delivery("outbox unavailable".to_string()))
        }
    }

    /// Never reports an existing reference number, so only the store's
    /// unique constraint can catch a duplicate.
    struct BlindReferenceLookup(Arc<dyn InvoiceStore>);

    #[async_trait]
    impl InvoiceStore for BlindReferenceLookup {
        async fn find(&self, id: &str) -> InvoicingResult<Option<Invoice>> {
            self.0.find(id).await
        }
        async fn find_by_reference_number(
            &self,
            _kind: InvoiceKind,
            _reference_number: &str,
        ) -> InvoicingResult<Option<Invoice>> {
            Ok(None)
        }
        async fn find_by_branch(
            &self,
            kind: InvoiceKind,
            branch_id: &str,
            limit: u32,
        ) -> InvoicingResult<Vec<Invoice>> {
            self.0.find_by_branch(kind, branch_id, limit).await
        }
        async fn find_all(&self, kind: InvoiceKind, limit: u32) -> InvoicingResult<Vec<Invoice>> {
            self.0.find_all(kind, limit).await
        }
        async fn ids_for_branch(
            &self,
            kind: InvoiceKind,
            branch_id: &str,
        ) -> InvoicingResult<Vec<String>> {
            self.0.ids_for_branch(kind, branch_id).await
        }
        async fn create(&self, invoice: &Invoice) -> InvoicingResult<()> {
            self.0.create(invoice).await
        }
        async fn save(&self, invoice: &Invoice) -> InvoicingResult<()> {
            self.0.save(invoice).await
        }
        async fn delete(&self, id: &str) -> InvoicingResult<()> {
            self.0.delete(id).await
        }
    }

    fn two_line_receipt(fx: &Fixture, reference: &str) -> NewInvoice {
        let mut input = sales_receipt(
            reference,
            vec![catalog_line(&fx.tea, 2, 500), catalog_line(&fx.biscuits, 1, 0)],
        );
        input.tax_rate_bps = 1000;
        input
    }

    // -------------------------------------------------------------------------
    // create
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_prices_from_catalog() {
        let fx = fixture().await;
        let created = fx
            .lifecycle()
            .create(&fx.manager.id, &fx.branch.id, two_line_receipt(&fx, "SR-1001"))
            .await
            .unwrap();

        let invoice = &created.invoice.invoice;
        assert_eq!(invoice.subtotal_cents, 11500);
        assert_eq!(invoice.tax_cents, 1150);
        assert_eq!(invoice.grand_total_cents, 12650);
        assert_eq!(invoice.lines[0].unit_price_cents, 5000);
        assert_eq!(invoice.lines[0].line_total_cents, 9500);
        assert_eq!(invoice.lines[1].name, "Biscuits");
        assert!(!created.is_degraded());
        assert_eq!(created.invoice.author.as_ref().unwrap().id, fx.manager.id);
    }

    #[tokio::test]
    async fn test_end_to_end_admin_create_links_branch() {
        let fx = fixture().await;
        let mut input = sales_receipt("SR-2001", vec![catalog_line(&fx.rice, 3, 0)]);
        input.tax_rate_bps = 800;

        let created = fx
            .lifecycle()
            .create(&fx.admin.id, &fx.branch.id, input)
            .await
            .unwrap();
        let id = created.invoice.invoice.id.clone();

        let stored = fx.db.invoices().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.subtotal_cents, 30000);
        assert_eq!(stored.grand_total_cents, 32400);
        assert_eq!(stored.branch_id, fx.branch.id);

        let branch = fx.db.branches().get_by_id(&fx.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.sales_receipt_invoices, vec![id]);
    }

    #[tokio::test]
    async fn test_create_defaults_mobile_number_to_branch_phone() {
        let fx = fixture().await;
        let created = fx
            .lifecycle()
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let InvoiceDetails::SalesReceipt(d) = &created.invoice.invoice.details else {
            panic!("expected a sales receipt");
        };
        assert_eq!(d.mobile_number, fx.branch.branch_phone_number);
    }

    #[tokio::test]
    async fn test_create_queues_notice_for_recipient() {
        let fx = fixture().await;
        let created = fx
            .lifecycle()
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let due = fx
            .db
            .notification_outbox()
            .get_due(Utc::now(), 5, 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].invoice_id, created.invoice.invoice.id);
        assert_eq!(due[0].recipient, "sita@example.com");
    }

    #[tokio::test]
    async fn test_create_expense() {
        let fx = fixture().await;
        let created = fx
            .lifecycle()
            .create(
                &fx.manager.id,
                &fx.branch.id,
                expense("REF-1", vec![expense_line("Electricity", 4500, 2)]),
            )
            .await
            .unwrap();

        assert_eq!(created.invoice.invoice.kind(), InvoiceKind::Expense);
        assert_eq!(created.invoice.invoice.grand_total_cents, 9000);

        let branch = fx.db.branches().get_by_id(&fx.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.expense_invoices.len(), 1);
        assert!(branch.sales_receipt_invoices.is_empty());
    }

    #[tokio::test]
    async fn test_expense_queues_notice_for_payer_too() {
        let fx = fixture().await;
        let mut input = expense("REF-1", vec![expense_line("Electricity", 4500, 2)]);
        if let InvoiceDetails::Expense(d) = &mut input.details {
            d.payer_name = Some("Branch Accounts".to_string());
            d.payer_email = Some("payer@example.com".to_string());
        }

        let created = fx
            .lifecycle()
            .create(&fx.manager.id, &fx.branch.id, input)
            .await
            .unwrap();
        assert!(!created.is_degraded());

        let due = fx
            .db
            .notification_outbox()
            .get_due(Utc::now(), 5, 10)
            .await
            .unwrap();
        let mut recipients: Vec<_> = due.iter().map(|e| e.recipient.as_str()).collect();
        recipients.sort();
        assert_eq!(
            recipients,
            vec!["accounts@himal.example.com", "payer@example.com"]
        );
    }

    #[tokio::test]
    async fn test_manager_scope_enforced() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        let err = lifecycle
            .create(&fx.manager.id, &fx.other_branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvoicingError::Forbidden {
                reason: DenyReason::OutOfScope,
                ..
            }
        ));

        assert!(lifecycle
            .create(&fx.manager.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_staff_cannot_create() {
        let fx = fixture().await;
        let err = fx
            .lifecycle()
            .create(&fx.staff.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_duplicate_reference_number_conflicts() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-7"))
            .await
            .unwrap();
        let err = lifecycle
            .create(&fx.admin.id, &fx.other_branch.id, two_line_receipt(&fx, "SR-7"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            fx.db.invoices().count(InvoiceKind::SalesReceipt).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_same_reference_number_allowed_across_kinds() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "N-1"))
            .await
            .unwrap();
        assert!(lifecycle
            .create(
                &fx.admin.id,
                &fx.branch.id,
                expense("N-1", vec![expense_line("Rent", 100, 1)])
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unique_constraint_backs_up_reference_check() {
        let fx = fixture().await;
        let stores = Stores {
            invoices: Arc::new(BlindReferenceLookup(Arc::clone(&fx.stores.invoices))),
            ..fx.stores.clone()
        };
        let lifecycle = InvoiceLifecycle::new(stores, InvoicingSettings::default());

        lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-7"))
            .await
            .unwrap();
        let err = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-7"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            fx.db.invoices().count(InvoiceKind::SalesReceipt).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_product_not_found_and_nothing_stored() {
        let fx = fixture().await;
        let input = sales_receipt(
            "SR-1",
            vec![LineItem {
                item: ItemRef::Catalog {
                    product_id: UNKNOWN.to_string(),
                },
                quantity: 1,
                discount_cents: 0,
            }],
        );

        let err = fx
            .lifecycle()
            .create(&fx.admin.id, &fx.branch.id, input)
            .await
            .unwrap_err();
        assert!(err.to_string().contains(UNKNOWN));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            fx.db.invoices().count(InvoiceKind::SalesReceipt).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_over_discount_rejected() {
        let fx = fixture().await;
        let input = sales_receipt("SR-1", vec![catalog_line(&fx.biscuits, 1, 2001)]);

        let err = fx
            .lifecycle()
            .create(&fx.admin.id, &fx.branch.id, input)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvoicingError::Validation(CoreError::DiscountExceedsLineValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_runs_before_lookups() {
        let fx = fixture().await;
        let input = sales_receipt("SR-1", Vec::new());

        // Actor does not exist, but the empty line list is reported first.
        let err = fx
            .lifecycle()
            .create(UNKNOWN, &fx.branch.id, input)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = fx
            .lifecycle()
            .create("bogus", &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[tokio::test]
    async fn test_branch_link_failure_is_degraded_success() {
        let fx = fixture().await;
        let stores = Stores {
            branches: Arc::new(FailingBranchSaves(Arc::clone(&fx.stores.branches))),
            ..fx.stores.clone()
        };
        let lifecycle = InvoiceLifecycle::new(stores, InvoicingSettings::default());

        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        assert!(matches!(
            created.degraded.as_slice(),
            [Degradation::BranchLinkFailed { .. }]
        ));
        let id = &created.invoice.invoice.id;
        assert!(fx.db.invoices().get_by_id(id).await.unwrap().is_some());

        // Reconciliation repairs the missing back-reference.
        let report = fx.coordinator().reconcile_branch(&fx.branch.id).await.unwrap();
        assert_eq!(report.added_sales_receipts, vec![id.clone()]);
    }

    #[tokio::test]
    async fn test_notice_failure_is_degraded_success() {
        let fx = fixture().await;
        let stores = Stores {
            notices: Arc::new(FailingNotices),
            ..fx.stores.clone()
        };
        let lifecycle = InvoiceLifecycle::new(stores, InvoicingSettings::default());

        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        assert!(matches!(
            created.degraded.as_slice(),
            [Degradation::NotificationQueueFailed { .. }]
        ));
        let branch = fx.db.branches().get_by_id(&fx.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.sales_receipt_invoices.len(), 1);
    }

    // -------------------------------------------------------------------------
    // update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.manager.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        let id = created.invoice.invoice.id.clone();

        let patch = InvoicePatch {
            customer_name: Some("Ram Thapa".to_string()),
            tax_rate_bps: Some(1300),
            ..Default::default()
        };
        let first = lifecycle
            .update(&fx.manager.id, &id, patch.clone())
            .await
            .unwrap();
        let after_first = fx.db.invoices().get_by_id(&id).await.unwrap().unwrap();

        let second = lifecycle.update(&fx.manager.id, &id, patch).await.unwrap();
        let after_second = fx.db.invoices().get_by_id(&id).await.unwrap().unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(second.invoice.grand_total_cents, first.invoice.grand_total_cents);
        assert_eq!(first.invoice.tax_cents, 1495);
        assert_eq!(first.invoice.grand_total_cents, 12995);
    }

    #[tokio::test]
    async fn test_line_patch_reprices_whole_invoice() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        let id = created.invoice.invoice.id.clone();

        let updated = lifecycle
            .update(
                &fx.admin.id,
                &id,
                InvoicePatch {
                    line: Some(LinePatch {
                        position: 1,
                        quantity: Some(3),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // 2 × 50.00 − 5.00 + 3 × 20.00 = 155.00, 10% tax
        assert_eq!(updated.invoice.lines[1].line_total_cents, 6000);
        assert_eq!(updated.invoice.subtotal_cents, 15500);
        assert_eq!(updated.invoice.tax_cents, 1550);
        assert_eq!(updated.invoice.grand_total_cents, 17050);
    }

    #[tokio::test]
    async fn test_line_patch_out_of_range() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let err = lifecycle
            .update(
                &fx.admin.id,
                &created.invoice.invoice.id,
                InvoicePatch {
                    line: Some(LinePatch {
                        position: 5,
                        quantity: Some(1),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_update_reference_collision() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        let second = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-2"))
            .await
            .unwrap();

        let patch = InvoicePatch {
            reference_number: Some("SR-1".to_string()),
            ..Default::default()
        };
        let err = lifecycle
            .update(&fx.admin.id, &second.invoice.invoice.id, patch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Re-submitting its own number is not a collision.
        let patch = InvoicePatch {
            reference_number: Some("SR-2".to_string()),
            ..Default::default()
        };
        assert!(lifecycle
            .update(&fx.admin.id, &second.invoice.invoice.id, patch)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_expense_fields_on_receipt() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let patch = InvoicePatch {
            type_of_expense: Some("rent".to_string()),
            ..Default::default()
        };
        let err = lifecycle
            .update(&fx.admin.id, &created.invoice.invoice.id, patch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_manager_cannot_update_other_branch() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.admin.id, &fx.other_branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let err = lifecycle
            .update(
                &fx.manager.id,
                &created.invoice.invoice.id,
                InvoicePatch::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_staff_denied_before_invoice_lookup() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        // Missing and existing ids look the same to a Staff actor.
        let err = lifecycle
            .update(&fx.staff.id, UNKNOWN, InvoicePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvoicingError::Forbidden {
                reason: DenyReason::RoleNotPermitted,
                ..
            }
        ));

        let err = lifecycle.get(&fx.staff.id, UNKNOWN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        let err = lifecycle
            .get(&fx.staff.id, &created.invoice.invoice.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_patch_validated_before_lookups() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        let bad_tax = InvoicePatch {
            tax_rate_bps: Some(10_001),
            ..Default::default()
        };
        let err = lifecycle
            .update(&fx.admin.id, UNKNOWN, bad_tax.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        // Unknown actor too: the patch is rejected before the actor lookup.
        let err = lifecycle.update(UNKNOWN, UNKNOWN, bad_tax).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let zero_qty = InvoicePatch {
            line: Some(LinePatch {
                position: 0,
                item: None,
                quantity: Some(0),
                discount_cents: None,
            }),
            ..Default::default()
        };
        let err = lifecycle
            .update(&fx.admin.id, UNKNOWN, zero_qty)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    // -------------------------------------------------------------------------
    // read / list / delete
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_hydrates_branch_and_author() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.manager.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        let fetched = lifecycle
            .get(&fx.manager.id, &created.invoice.invoice.id)
            .await
            .unwrap();
        assert_eq!(fetched.branch.unwrap().branch_name, fx.branch.branch_name);
        assert_eq!(fetched.author.unwrap().email, fx.manager.email);

        let err = lifecycle
            .get(&fx.other_manager.id, &created.invoice.invoice.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_list_all_respects_page_cap() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        for n in 0..50 {
            let branch = if n % 2 == 0 { &fx.branch } else { &fx.other_branch };
            lifecycle
                .create(
                    &fx.admin.id,
                    &branch.id,
                    sales_receipt(&format!("SR-{n:03}"), vec![catalog_line(&fx.tea, 1, 0)]),
                )
                .await
                .unwrap();
        }

        let page = lifecycle
            .list_all(&fx.admin.id, InvoiceKind::SalesReceipt)
            .await
            .unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].invoice.reference_number, "SR-000");
        assert!(page.iter().all(|i| i.branch.is_some() && i.author.is_some()));

        let err = lifecycle
            .list_all(&fx.manager.id, InvoiceKind::SalesReceipt)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_list_by_branch_filters_branch_and_kind() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();

        lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        lifecycle
            .create(&fx.admin.id, &fx.other_branch.id, two_line_receipt(&fx, "SR-2"))
            .await
            .unwrap();
        lifecycle
            .create(
                &fx.admin.id,
                &fx.branch.id,
                expense("REF-1", vec![expense_line("Rent", 100, 1)]),
            )
            .await
            .unwrap();

        let page = lifecycle
            .list_by_branch(&fx.manager.id, InvoiceKind::SalesReceipt, &fx.branch.id)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].invoice.reference_number, "SR-1");

        let settings = InvoicingSettings {
            list_page_cap: 0,
            ..Default::default()
        };
        let capped = InvoiceLifecycle::new(fx.stores.clone(), settings)
            .list_by_branch(&fx.admin.id, InvoiceKind::Expense, &fx.branch.id)
            .await
            .unwrap();
        assert!(capped.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let fx = fixture().await;
        let lifecycle = fx.lifecycle();
        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();
        let id = created.invoice.invoice.id.clone();

        let err = lifecycle.delete(&fx.manager.id, &id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        lifecycle.delete(&fx.admin.id, &id).await.unwrap();
        assert!(fx.db.invoices().get_by_id(&id).await.unwrap().is_none());

        let err = lifecycle.delete(&fx.admin.id, &id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Unlinking is off by default; the dangling id stays until reconciled.
        let branch = fx.db.branches().get_by_id(&fx.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.sales_receipt_invoices, vec![id.clone()]);

        let report = lifecycle.reconcile(&fx.admin.id, &fx.branch.id).await.unwrap();
        assert_eq!(report.removed_sales_receipts, vec![id]);
    }

    #[tokio::test]
    async fn test_delete_with_unlink() {
        let fx = fixture().await;
        let settings = InvoicingSettings {
            unlink_on_delete: true,
            ..Default::default()
        };
        let lifecycle = InvoiceLifecycle::new(fx.stores.clone(), settings);
        let created = lifecycle
            .create(&fx.admin.id, &fx.branch.id, two_line_receipt(&fx, "SR-1"))
            .await
            .unwrap();

        lifecycle
            .delete(&fx.admin.id, &created.invoice.invoice.id)
            .await
            .unwrap();

        let branch = fx.db.branches().get_by_id(&fx.branch.id).await.unwrap().unwrap();
        assert!(branch.sales_receipt_invoices.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_is_admin_only() {
        let fx = fixture().await;
        let err = fx
            .lifecycle()
            .reconcile(&fx.manager.id, &fx.branch.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
