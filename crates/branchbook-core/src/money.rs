//! # Money Module
//!
//! Provides the `Money` type for invoice amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Invoice totals must reconcile to the cent:                            │
//! │    subtotal = Σ (quantity × unit_price − discount)                     │
//! │    grand_total = subtotal + subtotal × tax%                            │
//! │                                                                         │
//! │  With floats, Σ depends on summation order and 0.1 + 0.2 ≠ 0.3.        │
//! │  With integer cents, every total is exact and order-independent,       │
//! │  and the only rounding step is the tax line (half-up at the cent).     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use branchbook_core::money::Money;
//! use branchbook_core::types::TaxRate;
//!
//! let subtotal = Money::from_major_minor(115, 0);
//! let tax = subtotal.calculate_tax(TaxRate::from_percentage(10.0));
//! assert_eq!((subtotal + tax).cents(), 12650); // $126.50
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that credit lines and corrections can be represented; the
/// pricer decides which negative values are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use branchbook_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion, always 0-99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax at `rate`, rounding half away from zero at the cent.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount × bps ± 5000) / 10000`.
    ///
    /// ```rust
    /// use branchbook_core::money::Money;
    /// use branchbook_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83); // $0.825 → $0.83
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128;
        let half = if scaled < 0 { -5000 } else { 5000 };
        Money::from_cents(((scaled + half) / 10000) as i64)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ```rust
    /// use branchbook_core::money::Money;
    ///
    /// let line = Money::from_cents(5000).checked_mul_quantity(2);
    /// assert_eq!(line, Some(Money::from_cents(10000)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts `other`, returning `None` on overflow.
    #[inline]
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering. Notices and UIs format amounts themselves.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Sums in iteration order.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
