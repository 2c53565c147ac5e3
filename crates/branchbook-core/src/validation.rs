//! # Validation Module
//!
//! Input validation for invoice and profile requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, fail fast)                                │
//! │  ├── Identifier syntax (UUID) before any lookup                        │
//! │  ├── Required header fields per invoice kind                           │
//! │  └── Line shape: quantity, discount, item kind                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Pricer (branchbook-core::pricing)                            │
//! │  └── Discount vs line value, overflow                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (kind, reference_number)                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use branchbook_core::validation::{validate_uuid, validate_quantity};
//!
//! assert!(validate_uuid("actor_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{
    InvoiceDetails, InvoiceKind, InvoicePatch, ItemRef, LineItem, NewInvoice,
    ProfilePatch,
};
use crate::{MAX_LINE_ITEMS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_REFERENCE_NUMBER_LEN: usize = 64;
const MAX_TEXT_LEN: usize = 500;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string, naming the offending field in the error.
///
/// ```rust
/// use branchbook_core::validation::validate_uuid;
///
/// assert!(validate_uuid("branch_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("branch_id", "not-a-uuid").is_err());
/// assert!(validate_uuid("branch_id", "").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

/// Validates an SR number or Ref number.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No whitespace or control characters
pub fn validate_reference_number(kind: InvoiceKind, value: &str) -> ValidationResult<()> {
    check_reference_number(kind.reference_label(), value)
}

fn check_reference_number(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > MAX_REFERENCE_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REFERENCE_NUMBER_LEN,
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
///
/// ```rust
/// use branchbook_core::validation::validate_email;
///
/// assert!(validate_email("email", "ram@example.com").is_ok());
/// assert!(validate_email("email", "ram@localhost").is_err());
/// assert!(validate_email("email", "not an email").is_err());
/// ```
pub fn validate_email(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    let invalid = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid email address".to_string(),
    };

    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || value.chars().any(char::is_whitespace)
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validates an optional phone number: digits plus `+ - ( )` and spaces.
pub fn validate_phone_number(field: &str, value: &str) -> ValidationResult<()> {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));

    if !allowed || !(6..=20).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a phone number of 6 to 20 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

pub fn validate_discount_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }

    Ok(())
}

/// Validates a caller-supplied unit price (expense lines only).
pub fn validate_unit_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

/// Validates an item reference against the invoice kind it belongs to.
pub fn validate_item_ref(kind: InvoiceKind, item: &ItemRef) -> ValidationResult<()> {
    if item.kind() != kind {
        return Err(ValidationError::not_allowed(
            "item",
            format!("{} line on a {} invoice", item.kind(), kind),
        ));
    }

    match item {
        ItemRef::Catalog { product_id } => validate_uuid("product_id", product_id),
        ItemRef::Expense {
            name,
            unit_price_cents,
            ..
        } => {
            validate_required_text("expense item name", name)?;
            validate_unit_price_cents(*unit_price_cents)
        }
    }
}

pub fn validate_line_item(kind: InvoiceKind, line: &LineItem) -> ValidationResult<()> {
    validate_item_ref(kind, &line.item)?;
    validate_quantity(line.quantity)?;
    validate_discount_cents(line.discount_cents)
}

/// Validates the line collection: non-empty, bounded, every line well formed.
pub fn validate_line_items(kind: InvoiceKind, lines: &[LineItem]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::required("lines"));
    }

    if lines.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    lines
        .iter()
        .try_for_each(|line| validate_line_item(kind, line))
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates the header and lines of a create request.
///
/// Runs before any store is touched.
pub fn validate_new_invoice(input: &NewInvoice) -> ValidationResult<()> {
    let kind = input.details.kind();

    validate_reference_number(kind, &input.reference_number)?;
    validate_tax_rate_bps(input.tax_rate_bps)?;

    match &input.details {
        InvoiceDetails::SalesReceipt(d) => {
            validate_required_text("customer_name", &d.customer_name)?;
            if let Some(email) = d.customer_email.as_deref().filter(|e| !e.trim().is_empty()) {
                validate_email("customer_email", email)?;
            }
        }
        InvoiceDetails::Expense(d) => {
            validate_required_text("recipient_name", &d.recipient_name)?;
            validate_email("recipient_email", &d.recipient_email)?;
            validate_required_text("type_of_expense", &d.type_of_expense)?;
            if let Some(email) = d.payer_email.as_deref().filter(|e| !e.trim().is_empty()) {
                validate_email("payer_email", email)?;
            }
        }
    }

    validate_line_items(kind, &input.lines)
}

/// Checks of a patch that do not depend on the target invoice.
///
/// Runs before any store is touched.
pub fn validate_patch_fields(patch: &InvoicePatch) -> ValidationResult<()> {
    if let Some(reference) = &patch.reference_number {
        check_reference_number("reference_number", reference)?;
    }
    if let Some(bps) = patch.tax_rate_bps {
        validate_tax_rate_bps(bps)?;
    }
    if let Some(name) = &patch.customer_name {
        validate_required_text("customer_name", name)?;
    }
    if let Some(expense_type) = &patch.type_of_expense {
        validate_required_text("type_of_expense", expense_type)?;
    }
    if let Some(line) = &patch.line {
        if let Some(qty) = line.quantity {
            validate_quantity(qty)?;
        }
        if let Some(discount) = line.discount_cents {
            validate_discount_cents(discount)?;
        }
    }
    Ok(())
}

/// Validates a patch against the kind of the invoice it targets.
///
/// Fields that only exist on the other kind are rejected.
pub fn validate_patch(kind: InvoiceKind, patch: &InvoicePatch) -> ValidationResult<()> {
    validate_patch_fields(patch)?;
    if let Some(reference) = &patch.reference_number {
        validate_reference_number(kind, reference)?;
    }

    let foreign: &[(&str, bool)] = match kind {
        InvoiceKind::SalesReceipt => &[
            ("payer_name", patch.payer_name.is_some()),
            ("type_of_expense", patch.type_of_expense.is_some()),
            ("message_on_statement", patch.message_on_statement.is_some()),
        ],
        InvoiceKind::Expense => &[
            ("customer_name", patch.customer_name.is_some()),
            ("date", patch.date.is_some()),
            ("message_to_customer", patch.message_to_customer.is_some()),
            ("message_to_statement", patch.message_to_statement.is_some()),
        ],
    };
    if let Some((field, _)) = foreign.iter().find(|(_, present)| *present) {
        return Err(ValidationError::not_allowed(
            field,
            format!("not a {} field", kind),
        ));
    }

    if let Some(item) = patch.line.as_ref().and_then(|line| line.item.as_ref()) {
        validate_item_ref(kind, item)?;
    }

    Ok(())
}

pub fn validate_profile_patch(patch: &ProfilePatch) -> ValidationResult<()> {
    if let Some(name) = &patch.full_name {
        validate_required_text("full_name", name)?;
    }
    if let Some(email) = &patch.email {
        validate_email("email", email)?;
    }
    if let Some(phone) = &patch.phone_number {
        validate_phone_number("phone_number", phone)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
