//! # Repository Module
//!
//! Database repository implementations for Branchbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  branchbook-invoicing store adapters                                   │
//! │       │                                                                 │
//! │       │  db.invoices().list_by_branch(kind, branch, 10)                │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── get_by_id / get_by_reference_number                               │
//! │  ├── list_by_branch / list_all / ids_for_branch                        │
//! │  └── insert / update / delete                                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`WorkerRepository`](worker::WorkerRepository) - Workers and profiles
//! - [`BranchRepository`](branch::BranchRepository) - Branches and invoice collections
//! - [`ProductRepository`](product::ProductRepository) - Product catalog
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Sales receipts and expenses
//! - [`NotificationOutboxRepository`](notification::NotificationOutboxRepository) - Notice queue

pub mod branch;
pub mod invoice;
pub mod notification;
pub mod product;
pub mod worker;
