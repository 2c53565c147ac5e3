//! # branchbook-invoicing: Invoice Lifecycle Services
//!
//! Orchestrates the stores around the pure core: resolves actors, applies
//! the role policy, prices and persists invoices, and keeps the branch
//! back-references consistent.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      branchbook-invoicing                               │
//! │                                                                         │
//! │   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐   │
//! │   │ InvoiceLifecycle │   │  StaffDirectory  │   │BackrefCoordinator│   │
//! │   └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘   │
//! │            │                      │                      │              │
//! │            └──────────┬───────────┴──────────────────────┘              │
//! │                       ▼                                                 │
//! │              IdentityResolver ──► branchbook_core::policy               │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │   store::{IdentityStore, BranchStore, CatalogStore,                     │
//! │           InvoiceStore, NoticeQueue}  ◄── branchbook-db (SQLite)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("branchbook.db")).await?;
//! let lifecycle = InvoiceLifecycle::new(Stores::sqlite(&db), InvoicingSettings::default());
//!
//! let created = lifecycle.create(&actor_id, &branch_id, new_invoice).await?;
//! for problem in &created.degraded {
//!     // the invoice exists; a side effect needs attention
//! }
//! ```

pub mod backref;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod settings;
pub mod staff;
pub mod store;

pub use backref::{BackrefCoordinator, ReconcileReport};
pub use error::{ApiError, ErrorKind, InvoicingError, InvoicingResult};
pub use identity::IdentityResolver;
pub use lifecycle::{Created, Degradation, HydratedInvoice, InvoiceLifecycle};
pub use settings::InvoicingSettings;
pub use staff::{StaffDirectory, StaffMember};
pub use store::Stores;

// =============================================================================
// Test Fixtures
// =============================================================================
