//! # Error Types
//!
//! Domain-specific error types for branchbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  branchbook-core errors (this file)                                    │
//! │  ├── CoreError        - Pricing / business rule failures               │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  branchbook-db errors (separate crate)                                 │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  branchbook-invoicing errors                                           │
//! │  ├── InvoicingError   - Taxonomy: InvalidIdentifier, Validation,       │
//! │  │                      NotFound, Conflict, Forbidden, Persistence     │
//! │  └── ApiError         - What callers see (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → InvoicingError → ApiError         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule errors raised by pure code (pricing, validation).
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// An invoice needs at least one line.
    #[error("Invoice must have at least one line item")]
    EmptyLineItems,

    /// Too many lines on a single invoice.
    #[error("Invoice cannot have more than {max} line items")]
    TooManyLineItems { max: usize },

    /// Discount is larger than `quantity × unit_price` for that line.
    ///
    /// ```text
    /// line 0: 2 × 50.00 = 100.00, discount 120.00
    ///      │
    ///      ▼
    /// DiscountExceedsLineValue { position: 0, discount_cents: 12000, line_value_cents: 10000 }
    /// ```
    #[error("Discount {discount_cents} on line {position} exceeds line value {line_value_cents}")]
    DiscountExceedsLineValue {
        position: usize,
        discount_cents: i64,
        line_value_cents: i64,
    },

    /// An intermediate total does not fit in i64 cents.
    #[error("Amount overflow while pricing line {position}")]
    AmountOverflow { position: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any store is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. invalid email, invalid phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Field is not accepted in this context.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn not_allowed(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::NotAllowed {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::DiscountExceedsLineValue {
            position: 1,
            discount_cents: 12000,
            line_value_cents: 10000,
        };
        assert_eq!(
            err.to_string(),
            "Discount 12000 on line 1 exceeds line value 10000"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("customer_name").to_string(),
            "customer_name is required"
        );

        let err = ValidationError::not_allowed("payer_name", "not a sales receipt field");
        assert_eq!(
            err.to_string(),
            "payer_name is not allowed: not a sales receipt field"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("lines").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
