//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Where Money Lives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product.price_cents ──► CartItem.unit_price ──► Totals.subtotal        │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                         Quotation / Order totals (frozen snapshots)     │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                 Zoho sales order line "rate" (decimal on the wire)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stored amount is an integer count of minor units. Floats appear only at
//! the Zoho JSON boundary (`as_major_f64` / `from_major_f64`).
//!
//! ## Usage
//! ```rust
//! use tradeflow_core::money::Money;
//!
//! let price = Money::parse_decimal("12.50").unwrap();
//! assert_eq!(price.cents(), 1250);
//! assert_eq!((price * 3).to_decimal_string(), "37.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// A monetary value in the smallest currency unit of the organization's currency.
///
/// Signed so that discounts and credit notes can be expressed without a second type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole major units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Minor part (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
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
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax on this amount, rounding half up.
    ///
    /// ## Implementation
    /// `(amount * bps + 5000) / 10000` on an i128 intermediate so that large B2B
    /// order lines cannot overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::Money;
    /// use tradeflow_core::types::TaxRate;
    ///
    /// // 18% GST on 1,000.00
    /// let tax = Money::from_cents(100_000).calculate_tax(TaxRate::from_bps(1800));
    /// assert_eq!(tax.cents(), 18_000);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(apply_bps(self.0, rate.bps()))
    }

    /// The amount removed by a percentage discount given in basis points.
    pub fn discount_amount(&self, discount_bps: u32) -> Money {
        Money(apply_bps(self.0, discount_bps))
    }

    /// Returns the amount left after a percentage discount.
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10_000);
    /// assert_eq!(subtotal.apply_discount_bps(1_000).cents(), 9_000);
    /// ```
    pub fn apply_discount_bps(&self, discount_bps: u32) -> Money {
        *self - self.discount_amount(discount_bps)
    }

    /// Parses a decimal string such as `"12"`, `"12.5"` or `"-3.10"`.
    ///
    /// At most two fractional digits are accepted; anything finer would silently
    /// lose precision, so it is rejected.
    pub fn parse_decimal(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits before the decimal point"));
        }
        if minor_str.len() > 2 || !minor_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimal places are allowed"));
        }

        let major: i64 = major_str
            .parse()
            .map_err(|_| invalid("amount is too large"))?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => minor_str.parse::<i64>().map_err(|_| invalid("bad fraction"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Renders the amount as a plain decimal string (`"1234.50"`).
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }

    /// Major units as a float, for Zoho request bodies only.
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Converts a Zoho decimal (e.g. `"rate": 12.5`) into minor units.
    pub fn from_major_f64(value: f64) -> Money {
        Money((value * 100.0).round() as i64)
    }
}

fn apply_bps(amount: i64, bps: u32) -> i64 {
    let scaled = amount as i128 * bps as i128;
    // Round half away from zero so refunds mirror charges.
    let rounded = if scaled >= 0 {
        (scaled + 5_000) / 10_000
    } else {
        (scaled - 5_000) / 10_000
    };
    rounded as i64
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
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

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
