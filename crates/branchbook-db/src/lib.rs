//! # branchbook-db: Database Layer for Branchbook
//!
//! SQLite storage for workers, branches, the product catalog, invoices and
//! the notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Branchbook Data Flow                             │
//! │                                                                         │
//! │  InvoiceLifecycle::create (branchbook-invoicing)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   branchbook-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ WorkerRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ BranchRepo    │    │ 0001_init    │  │   │
//! │  │   │ WAL, FKs on   │    │ InvoiceRepo   │    │              │  │   │
//! │  │   │               │    │ OutboxRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use branchbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("branchbook.db")).await?;
//! let invoice = db.invoices().get_by_id(&id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::branch::BranchRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::notification::{NotificationOutboxRepository, OutboxEntry};
pub use repository::product::ProductRepository;
pub use repository::worker::WorkerRepository;

// =============================================================================
// Test Fixtures
// =============================================================================
