//! # branchbook-core: Pure Business Logic for Branchbook
//!
//! Money, domain types, validation, the role policy engine and the
//! line-item pricer. Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Branchbook Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          External handler (HTTP, CLI, ...)                      │   │
//! │  │     supplies actor id + target ids                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          branchbook-invoicing (lifecycle, scope, backrefs)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ branchbook-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  policy   │  │  pricing  │  │   │
//! │  │   │  Invoice  │  │   Money   │  │ authorize │  │   price   │  │   │
//! │  │   │  Branch   │  │  TaxRate  │  │   Scope   │  │  totals   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Worker, Branch, Invoice, line items)
//! - [`money`] - Money type with integer arithmetic
//! - [`policy`] - Role / branch-scope decisions
//! - [`pricing`] - Line totals, subtotal, tax, grand total
//! - [`validation`] - Input validation
//! - [`notice`] - Snapshot handed to the notification side channel
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use branchbook_core::money::Money;
//! use branchbook_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(30000);
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(800));
//! assert_eq!((subtotal + tax).cents(), 32400);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod notice;
pub mod policy;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use notice::InvoiceNotice;
pub use policy::{authorize, authorize_role, Action, Decision, DenyReason, Scope};
pub use pricing::{price, PricedTotals, ResolvedLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default number of records a listing returns.
pub const DEFAULT_PAGE_CAP: u32 = 10;

/// Maximum lines on a single invoice.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches mistyped quantities before they reach pricing.
pub const MAX_LINE_QUANTITY: i64 = 100_000;
