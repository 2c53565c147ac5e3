//! # Invoicing Error Types
//!
//! The error taxonomy every invoicing operation reports.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  uuid parse failure ───────────────► InvalidIdentifier                 │
//! │  ValidationError / CoreError ──────► Validation                        │
//! │  missing actor/branch/invoice/... ─► NotFound                          │
//! │  DbError::UniqueViolation ─────────► Conflict                          │
//! │  policy Decision::Deny ────────────► Forbidden                         │
//! │  any other DbError ────────────────► Persistence                       │
//! │  notice enqueue failure ───────────► Delivery (degraded success only)  │
//! │                                                                         │
//! │  InvoicingError ──► ApiError { code, message }                         │
//! │  Persistence details are logged, never returned.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use branchbook_core::{Action, CoreError, DenyReason, ValidationError};
use branchbook_db::DbError;

/// Errors returned by invoicing operations.
#[derive(Debug, Error)]
pub enum InvoicingError {
    /// An identifier is not a well-formed UUID. Checked before any lookup.
    #[error("Invalid {field}: '{value}'")]
    InvalidIdentifier { field: String, value: String },

    /// Missing or malformed fields, bad line data, over-discount.
    #[error("{0}")]
    Validation(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Duplicate reference number.
    #[error("{field} '{value}' already exists")]
    Conflict { field: String, value: String },

    #[error("Not allowed to {action}: {reason}")]
    Forbidden { action: Action, reason: DenyReason },

    /// A store write or read failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A notification could not be handed to the outbox.
    #[error("Delivery failure: {0}")]
    Delivery(String),
}

impl InvoicingError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        InvoicingError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_identifier(field: impl Into<String>, value: impl Into<String>) -> Self {
        InvoicingError::InvalidIdentifier {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Stable, machine-checkable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoicingError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            InvoicingError::Validation(_) => ErrorKind::ValidationError,
            InvoicingError::NotFound { .. } => ErrorKind::NotFound,
            InvoicingError::Conflict { .. } => ErrorKind::Conflict,
            InvoicingError::Forbidden { .. } => ErrorKind::Forbidden,
            InvoicingError::Persistence(_) => ErrorKind::PersistenceError,
            InvoicingError::Delivery(_) => ErrorKind::DeliveryError,
        }
    }
}

impl From<ValidationError> for InvoicingError {
    fn from(err: ValidationError) -> Self {
        InvoicingError::Validation(CoreError::Validation(err))
    }
}

/// Convert DbError to InvoicingError.
///
/// ```text
/// DbError::UniqueViolation → Conflict
/// DbError::NotFound        → NotFound
/// Other                    → Persistence
/// ```
impl From<DbError> for InvoicingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { field, value } => InvoicingError::Conflict { field, value },
            DbError::NotFound { entity, id } => InvoicingError::NotFound { entity, id },
            other => InvoicingError::Persistence(other.to_string()),
        }
    }
}

/// Result type for invoicing operations.
pub type InvoicingResult<T> = Result<T, InvoicingError>;

// =============================================================================
// API Error
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidIdentifier,
    ValidationError,
    NotFound,
    Conflict,
    Forbidden,
    PersistenceError,
    DeliveryError,
}

/// What a caller outside this workspace sees.
///
/// ```json
/// { "code": "FORBIDDEN", "message": "Not allowed to create invoice: ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<InvoicingError> for ApiError {
    fn from(err: InvoicingError) -> Self {
        let code = err.kind();
        match err {
            InvoicingError::Persistence(detail) => {
                // Log the actual error but return a generic message
                tracing::error!(error = %detail, "Store operation failed");
                ApiError::new(code, "Storage operation failed")
            }
            InvoicingError::Delivery(detail) => {
                tracing::error!(error = %detail, "Notification queueing failed");
                ApiError::new(code, "Notification could not be queued")
            }
            other => ApiError::new(code, other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================
