//! # Line-Item Pricer
//!
//! Turns resolved lines into per-line totals, subtotal, tax and grand total.
//!
//! ## Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LineItem (caller)                                                      │
//! │       │  catalog lookup / expense entry   (lifecycle manager, in order) │
//! │       ▼                                                                 │
//! │  ResolvedLine { quantity, unit_price, discount }                       │
//! │       │  price()  ← THIS MODULE                                         │
//! │       ▼                                                                 │
//! │  line_total  = quantity × unit_price − discount                        │
//! │  subtotal    = Σ line_total            (input order)                   │
//! │  tax         = round_half_up(subtotal × bps / 10000)                   │
//! │  grand_total = subtotal + tax                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are never accepted from callers. Everything is checked integer
//! arithmetic, so the same input always yields the same output.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ItemRef, PricedLine, TaxRate};
use crate::validation::{validate_discount_cents, validate_quantity, validate_tax_rate_bps};

/// A line whose unit price has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub item: ItemRef,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedTotals {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
}

/// Prices `lines` at `tax`.
///
/// ## Errors
/// - `EmptyLineItems` for an empty slice
/// - `Validation` for a non-positive quantity or negative discount
/// - `DiscountExceedsLineValue` when discount > quantity × unit_price
/// - `AmountOverflow` when a total leaves the i64 range
///
/// ```rust
/// use branchbook_core::money::Money;
/// use branchbook_core::pricing::{price, ResolvedLine};
/// use branchbook_core::types::{ItemRef, TaxRate};
///
/// let line = |qty, unit, discount| ResolvedLine {
///     item: ItemRef::Catalog { product_id: "p".into() },
///     name: "Item".into(),
///     quantity: qty,
///     unit_price: Money::from_cents(unit),
///     discount: Money::from_cents(discount),
/// };
///
/// let totals = price(&[line(2, 5000, 500), line(1, 2000, 0)], TaxRate::from_bps(1000)).unwrap();
/// assert_eq!(totals.subtotal.cents(), 11500);
/// assert_eq!(totals.grand_total.cents(), 12650);
/// ```
pub fn price(lines: &[ResolvedLine], tax: TaxRate) -> CoreResult<PricedTotals> {
    if lines.is_empty() {
        return Err(CoreError::EmptyLineItems);
    }
    validate_tax_rate_bps(tax.bps())?;

    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Money::zero();

    for (position, line) in lines.iter().enumerate() {
        let line_total = price_line(position, line)?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or(CoreError::AmountOverflow { position })?;

        priced.push(PricedLine {
            item: line.item.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            discount_cents: line.discount.cents(),
            line_total_cents: line_total.cents(),
        });
    }

    let tax_amount = subtotal.calculate_tax(tax);
    let grand_total = subtotal
        .checked_add(tax_amount)
        .ok_or(CoreError::AmountOverflow {
            position: lines.len() - 1,
        })?;

    Ok(PricedTotals {
        lines: priced,
        subtotal,
        tax: tax_amount,
        grand_total,
    })
}

fn price_line(position: usize, line: &ResolvedLine) -> CoreResult<Money> {
    validate_quantity(line.quantity)?;
    validate_discount_cents(line.discount.cents())?;

    let line_value = line
        .unit_price
        .checked_mul_quantity(line.quantity)
        .ok_or(CoreError::AmountOverflow { position })?;

    if line.discount > line_value {
        return Err(CoreError::DiscountExceedsLineValue {
            position,
            discount_cents: line.discount.cents(),
            line_value_cents: line_value.cents(),
        });
    }

    Ok(line_value - line.discount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn line(quantity: i64, unit_cents: i64, discount_cents: i64) -> ResolvedLine {
        ResolvedLine {
            item: ItemRef::Catalog {
                product_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            },
            name: "Rice 5kg".to_string(),
            quantity,
            unit_price: Money::from_cents(unit_cents),
            discount: Money::from_cents(discount_cents),
        }
    }

    #[test]
    fn test_two_lines_ten_percent() {
        let totals = price(
            &[line(2, 5000, 500), line(1, 2000, 0)],
            TaxRate::from_bps(1000),
        )
        .unwrap();

        assert_eq!(totals.lines[0].line_total_cents, 9500);
        assert_eq!(totals.lines[1].line_total_cents, 2000);
        assert_eq!(totals.subtotal, Money::from_major_minor(115, 0));
        assert_eq!(totals.tax, Money::from_major_minor(11, 50));
        assert_eq!(totals.grand_total, Money::from_major_minor(126, 50));
    }

    #[test]
    fn test_three_hundred_at_eight_percent() {
        let totals = price(&[line(3, 10000, 0)], TaxRate::from_bps(800)).unwrap();
        assert_eq!(totals.subtotal.cents(), 30000);
        assert_eq!(totals.grand_total.cents(), 32400);
    }

    #[test]
    fn test_zero_tax() {
        let totals = price(&[line(1, 999, 0)], TaxRate::zero()).unwrap();
        assert_eq!(totals.tax, Money::zero());
        assert_eq!(totals.grand_total, totals.subtotal);
    }

    #[test]
    fn test_empty_lines() {
        assert_eq!(price(&[], TaxRate::zero()), Err(CoreError::EmptyLineItems));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let err = price(&[line(0, 100, 0)], TaxRate::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_negative_discount_rejected() {
        let err = price(&[line(1, 100, -1)], TaxRate::zero()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_discount_may_equal_line_value() {
        let totals = price(&[line(2, 100, 200)], TaxRate::zero()).unwrap();
        assert_eq!(totals.subtotal, Money::zero());
    }

    #[test]
    fn test_over_discount_rejected() {
        let err = price(&[line(1, 100, 0), line(2, 100, 201)], TaxRate::zero()).unwrap_err();
        assert_eq!(
            err,
            CoreError::DiscountExceedsLineValue {
                position: 1,
                discount_cents: 201,
                line_value_cents: 200,
            }
        );
    }

    #[test]
    fn test_overflow_detected() {
        let err = price(&[line(2, i64::MAX / 2 + 1, 0)], TaxRate::zero()).unwrap_err();
        assert_eq!(err, CoreError::AmountOverflow { position: 0 });
    }

    #[test]
    fn test_deterministic() {
        let lines = [line(3, 333, 1), line(7, 1429, 13), line(1, 1, 0)];
        let a = price(&lines, TaxRate::from_bps(825)).unwrap();
        let b = price(&lines, TaxRate::from_bps(825)).unwrap();
        assert_eq!(a, b);
    }
}
