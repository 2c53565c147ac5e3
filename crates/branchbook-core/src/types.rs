//! # Domain Types
//!
//! Core domain types used throughout Branchbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Worker       │   │     Branch      │   │    Invoice      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  role           │◄──│  branch_staff   │   │  reference_no.  │       │
//! │  │  branch_id ─────┼──►│  sales_receipt_ │◄──┼─ branch_id      │       │
//! │  │                 │   │   invoices [ids]│   │  lines [priced] │       │
//! │  └─────────────────┘   │  expense_       │   │  subtotal/tax/  │       │
//! │                        │   invoices [ids]│   │   grand_total   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CatalogItem    │   │    LineItem     │   │   PricedLine    │       │
//! │  │  authoritative  │──►│  (input only)   │──►│  snapshot of    │       │
//! │  │  unit price     │   │  qty, discount  │   │  resolved price │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Invoices carry both a storage `id` (UUID v4) and a business
//! `reference_number` (SR number / Ref number) that is unique per kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bps = 0.01%, 1000 bps = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage, e.g. `8.0` for 8%.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Role & Worker
// =============================================================================

/// Role of a worker. Decides which actions the policy engine allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker: the actor behind every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Worker {
    pub id: String,
    pub role: Role,
    /// Home branch. Required for Manager and Staff, optional for Admin.
    pub branch_id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Subset of worker fields embedded in hydrated responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkerSummary {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
}

impl From<&Worker> for WorkerSummary {
    fn from(w: &Worker) -> Self {
        WorkerSummary {
            id: w.id.clone(),
            full_name: w.full_name.clone(),
            email: w.email.clone(),
            phone_number: w.phone_number.clone(),
            role: w.role,
        }
    }
}

// =============================================================================
// Branch
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BranchAddress {
    pub country: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub street: Option<String>,
}

impl std::fmt::Display for BranchAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = [&self.street, &self.district, &self.province, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// A branch and its denormalized invoice-id collections.
///
/// The collections are a cache of invoice existence. The invoice table,
/// filtered by `branch_id`, is the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub branch_name: String,
    pub branch_phone_number: Option<String>,
    pub address: BranchAddress,
    /// Worker responsible for the branch.
    pub branch_staff: Option<String>,
    pub sales_receipt_invoices: Vec<String>,
    pub expense_invoices: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// Returns the id collection for invoices of `kind`.
    pub fn invoice_ids(&self, kind: InvoiceKind) -> &Vec<String> {
        match kind {
            InvoiceKind::SalesReceipt => &self.sales_receipt_invoices,
            InvoiceKind::Expense => &self.expense_invoices,
        }
    }

    pub fn invoice_ids_mut(&mut self, kind: InvoiceKind) -> &mut Vec<String> {
        match kind {
            InvoiceKind::SalesReceipt => &mut self.sales_receipt_invoices,
            InvoiceKind::Expense => &mut self.expense_invoices,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BranchSummary {
    pub id: String,
    pub branch_name: String,
    pub branch_phone_number: Option<String>,
    pub address: BranchAddress,
}

impl From<&Branch> for BranchSummary {
    fn from(b: &Branch) -> Self {
        BranchSummary {
            id: b.id.clone(),
            branch_name: b.branch_name.clone(),
            branch_phone_number: b.branch_phone_number.clone(),
            address: b.address.clone(),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product. Its `price_cents` is the only trusted unit price
/// for sales-receipt lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    pub quantity_on_hand: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Invoice Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    SalesReceipt,
    Expense,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::SalesReceipt => "sales_receipt",
            InvoiceKind::Expense => "expense",
        }
    }

    /// Name of the business reference number for this kind.
    pub fn reference_label(&self) -> &'static str {
        match self {
            InvoiceKind::SalesReceipt => "SR number",
            InvoiceKind::Expense => "Ref number",
        }
    }

    pub const ALL: [InvoiceKind; 2] = [InvoiceKind::SalesReceipt, InvoiceKind::Expense];
}

impl std::fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Items
// =============================================================================

/// What a line item refers to.
///
/// Sales receipts reference catalog products and never trust a
/// caller-supplied price. Expense lines have no catalog: the entry itself is
/// the item record and carries its own unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ItemRef {
    Catalog {
        product_id: String,
    },
    Expense {
        name: String,
        description: Option<String>,
        unit_price_cents: i64,
    },
}

impl ItemRef {
    pub fn kind(&self) -> InvoiceKind {
        match self {
            ItemRef::Catalog { .. } => InvoiceKind::SalesReceipt,
            ItemRef::Expense { .. } => InvoiceKind::Expense,
        }
    }
}

/// A line item as submitted by the caller. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub item: ItemRef,
    pub quantity: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

/// A priced line as stored on the invoice.
///
/// Snapshot pattern: name and unit price are frozen at pricing time, so a
/// later catalog price change does not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub item: ItemRef,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    /// quantity × unit_price − discount
    pub line_total_cents: i64,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Invoice Details (per kind)
// =============================================================================

/// Customer-facing fields of a sales receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesReceiptDetails {
    pub customer_name: String,
    pub customer_phone_number: Option<String>,
    /// Contact number printed on the receipt; defaults to the branch phone.
    pub mobile_number: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub message_to_customer: Option<String>,
    pub message_to_statement: Option<String>,
}

/// Payer / recipient fields of an expense invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseDetails {
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub recipient_name: String,
    pub recipient_email: String,
    pub type_of_expense: String,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub message_on_statement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvoiceDetails {
    SalesReceipt(SalesReceiptDetails),
    Expense(ExpenseDetails),
}

impl InvoiceDetails {
    pub fn kind(&self) -> InvoiceKind {
        match self {
            InvoiceDetails::SalesReceipt(_) => InvoiceKind::SalesReceipt,
            InvoiceDetails::Expense(_) => InvoiceKind::Expense,
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A persisted sales receipt or expense invoice.
///
/// Monetary fields are always computed from `lines` and `tax_rate_bps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// SR number (sales receipt) or Ref number (expense). Unique per kind.
    pub reference_number: String,
    pub branch_id: String,
    pub created_by: String,
    pub lines: Vec<PricedLine>,
    pub tax_rate_bps: u32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub details: InvoiceDetails,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn kind(&self) -> InvoiceKind {
        self.details.kind()
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

// =============================================================================
// Invoice Inputs
// =============================================================================

/// Request body for creating an invoice. Carries no monetary totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub reference_number: String,
    #[serde(default)]
    pub tax_rate_bps: u32,
    pub lines: Vec<LineItem>,
    pub details: InvoiceDetails,
}

/// Replaces or adjusts the line at `position`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LinePatch {
    pub position: usize,
    pub item: Option<ItemRef>,
    pub quantity: Option<i64>,
    pub discount_cents: Option<i64>,
}

/// Whitelisted update fields. `None` means "keep the stored value".
///
/// Fields that belong to the other invoice kind are rejected rather than
/// silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoicePatch {
    pub reference_number: Option<String>,
    pub tax_rate_bps: Option<u32>,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    // Sales receipt only
    pub customer_name: Option<String>,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub message_to_customer: Option<String>,
    pub message_to_statement: Option<String>,
    // Expense only
    pub payer_name: Option<String>,
    pub type_of_expense: Option<String>,
    pub message_on_statement: Option<String>,
    pub line: Option<LinePatch>,
}

impl InvoicePatch {
    /// True when applying the patch requires repricing.
    pub fn touches_pricing(&self) -> bool {
        self.tax_rate_bps.is_some() || self.line.is_some()
    }
}

/// Profile fields a worker may change on their own record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
