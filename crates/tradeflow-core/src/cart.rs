//! # Cart Math
//!
//! Line pricing and totals shared by carts, quotations and orders.
//!
//! ## Totals Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricedLine (frozen unit price, tax rate, discount)                     │
//! │       │                                                                 │
//! │       ├── line_subtotal = unit_price × qty                              │
//! │       ├── line_discount = line_subtotal × discount_bps                  │
//! │       ├── line_tax      = (line_subtotal − line_discount) × tax_rate    │
//! │       └── line_total    = line_subtotal − line_discount + line_tax      │
//! │                                                                         │
//! │  Totals::from_lines                                                     │
//! │       subtotal = Σ line_subtotal                                        │
//! │       discount = Σ line_discount                                        │
//! │       tax      = Σ line_tax          (per line, then summed)            │
//! │       total    = subtotal − discount + tax                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tax is rounded per line before summing so that the stored order lines always
//! add up to the stored order total.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartItem, Product, TaxRate};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Priced Line
// =============================================================================

/// A line ready for pricing. Prices are captured at the time the line was
/// created, not read live from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    pub quantity: i64,
    pub discount_bps: u32,
}

impl PricedLine {
    /// Prices a product at its current catalog price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        PricedLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.price(),
            tax_rate: product.tax_rate(),
            quantity,
            discount_bps: 0,
        }
    }

    /// Prices a cart line using the price frozen on the line.
    pub fn from_cart_item(item: &CartItem, product: &Product) -> Self {
        PricedLine {
            product_id: item.product_id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: Money::from_cents(item.unit_price_cents),
            tax_rate: TaxRate::from_bps(item.tax_rate_bps),
            quantity: item.quantity,
            discount_bps: 0,
        }
    }

    pub fn with_discount(mut self, discount_bps: u32) -> Self {
        self.discount_bps = discount_bps;
        self
    }

    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }

    #[inline]
    pub fn line_discount(&self) -> Money {
        self.line_subtotal().discount_amount(self.discount_bps)
    }

    /// Tax on the discounted amount.
    #[inline]
    pub fn line_tax(&self) -> Money {
        (self.line_subtotal() - self.line_discount()).calculate_tax(self.tax_rate)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.line_subtotal() - self.line_discount() + self.line_tax()
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Aggregate amounts for a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    pub fn from_lines(lines: &[PricedLine]) -> Self {
        let subtotal: Money = lines.iter().map(PricedLine::line_subtotal).sum();
        let discount: Money = lines.iter().map(PricedLine::line_discount).sum();
        let tax: Money = lines.iter().map(PricedLine::line_tax).sum();

        Totals {
            item_count: lines.len(),
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

// =============================================================================
// Quantity Rules
// =============================================================================

/// Checks a requested line quantity against the product's ordering rules.
///
/// ## Order of Checks
/// 1. Product must be active
/// 2. `quantity` positive and within the global ceiling
/// 3. At least `min_order_quantity`
/// 4. At most `max_order_quantity` (when set)
/// 5. Within `stock_quantity` (when tracked)
pub fn check_order_quantity(product: &Product, quantity: i64) -> CoreResult<()> {
    if !product.is_active {
        return Err(CoreError::ProductUnavailable {
            sku: product.sku.clone(),
        });
    }

    if quantity <= 0 {
        return Err(crate::error::ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }

    if quantity < product.min_order_quantity {
        return Err(CoreError::BelowMinimumQuantity {
            sku: product.sku.clone(),
            min: product.min_order_quantity,
            requested: quantity,
        });
    }

    if let Some(max) = product.max_order_quantity {
        if quantity > max {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max,
            });
        }
    }

    if let Some(available) = product.stock_quantity {
        if quantity > available {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available,
                requested: quantity,
            });
        }
    }

    Ok(())
}

/// Quantity of a line after merging a guest line into an existing user line.
/// Capped at the global ceiling so a merge can never produce an unorderable line.
pub fn merge_quantities(existing: i64, added: i64) -> i64 {
    existing.saturating_add(added).min(MAX_ITEM_QUANTITY)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(price_cents: i64, tax_rate_bps: u32) -> Product {
        Product {
            id: "p1".to_string(),
            organization_id: "o1".to_string(),
            sku: "BOLT-M8".to_string(),
            slug: "bolt-m8".to_string(),
            name: "Hex Bolt M8".to_string(),
            description: None,
            category: Some("Fasteners".to_string()),
            unit: "box".to_string(),
            price_cents,
            tax_rate_bps,
            min_order_quantity: 1,
            max_order_quantity: None,
            stock_quantity: None,
            zoho_item_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_math() {
        let line = PricedLine::from_product(&product(1000, 825), 1);
        assert_eq!(line.line_subtotal().cents(), 1000);
        // 10.00 × 8.25% = 0.825 → 0.83
        assert_eq!(line.line_tax().cents(), 83);
        assert_eq!(line.line_total().cents(), 1083);
    }

    #[test]
    fn test_tax_applies_after_discount() {
        let line = PricedLine::from_product(&product(10_000, 1800), 2).with_discount(1000);
        assert_eq!(line.line_subtotal().cents(), 20_000);
        assert_eq!(line.line_discount().cents(), 2_000);
        assert_eq!(line.line_tax().cents(), 3_240);
        assert_eq!(line.line_total().cents(), 21_240);
    }

    #[test]
    fn test_totals_sum_per_line_tax() {
        // Three lines at 0.333 tax each: per-line rounding gives 0.99, not 1.00
        let mut p = product(1000, 333);
        let mut lines = Vec::new();
        for i in 0..3 {
            p.id = format!("p{i}");
            lines.push(PricedLine::from_product(&p, 1));
        }

        let totals = Totals::from_lines(&lines);
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.total_quantity, 3);
        assert_eq!(totals.subtotal.cents(), 3000);
        assert_eq!(totals.tax.cents(), 99);
        assert_eq!(totals.total.cents(), 3099);
    }

    #[test]
    fn test_empty_totals() {
        let totals = Totals::from_lines(&[]);
        assert!(totals.is_empty());
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_check_order_quantity() {
        let mut p = product(500, 0);
        p.min_order_quantity = 10;
        p.max_order_quantity = Some(100);
        p.stock_quantity = Some(40);

        assert!(check_order_quantity(&p, 10).is_ok());
        assert!(matches!(
            check_order_quantity(&p, 5),
            Err(CoreError::BelowMinimumQuantity { min: 10, .. })
        ));
        assert!(matches!(
            check_order_quantity(&p, 41),
            Err(CoreError::InsufficientStock { available: 40, .. })
        ));

        p.stock_quantity = None;
        assert!(matches!(
            check_order_quantity(&p, 101),
            Err(CoreError::QuantityTooLarge { max: 100, .. })
        ));
        assert!(matches!(
            check_order_quantity(&p, 0),
            Err(CoreError::Validation(_))
        ));

        p.is_active = false;
        assert!(matches!(
            check_order_quantity(&p, 10),
            Err(CoreError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn test_merge_quantities() {
        assert_eq!(merge_quantities(2, 3), 5);
        assert_eq!(merge_quantities(MAX_ITEM_QUANTITY, 1), MAX_ITEM_QUANTITY);
        assert_eq!(merge_quantities(i64::MAX, 1), MAX_ITEM_QUANTITY);
    }
}
