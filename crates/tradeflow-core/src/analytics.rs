//! # Sales Analytics
//!
//! Pure aggregation over order lines. The database layer produces flat
//! [`SalesRow`]s (one per order line, cancelled orders excluded); everything here
//! is grouping and sorting.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderRepository::sales_rows(org, from, to)                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │     Vec<SalesRow> ──┬── sales_by_period(Day | Week | Month)             │
//! │                     ├── sales_by_category                               │
//! │                     ├── top_products(limit)                             │
//! │                     └── summary                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

/// Label used for lines whose product had no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One order line, flattened for aggregation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesRow {
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// First day of the bucket containing `date`. Weeks start on Monday.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Day
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            _ => Err(ValidationError::NotAllowed {
                field: "granularity".to_string(),
                allowed: vec!["day".to_string(), "week".to_string(), "month".to_string()],
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeriodBucket {
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    /// Distinct orders with at least one line in the bucket.
    pub order_count: i64,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryBucket {
    pub category: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub order_count: i64,
    pub quantity: i64,
    pub revenue_cents: i64,
    /// Revenue / order_count, rounded down. Zero when there are no orders.
    pub average_order_cents: i64,
}

// =============================================================================
// Aggregations
// =============================================================================

/// Revenue per period, ordered by `period_start` ascending.
pub fn sales_by_period(rows: &[SalesRow], granularity: Granularity) -> Vec<PeriodBucket> {
    let mut buckets: BTreeMap<NaiveDate, (HashSet<&str>, i64, i64)> = BTreeMap::new();

    for row in rows {
        let start = granularity.period_start(row.created_at.date_naive());
        let entry = buckets.entry(start).or_default();
        entry.0.insert(row.order_id.as_str());
        entry.1 += row.quantity;
        entry.2 += row.line_total_cents;
    }

    buckets
        .into_iter()
        .map(|(period_start, (orders, quantity, revenue_cents))| PeriodBucket {
            period_start,
            order_count: orders.len() as i64,
            quantity,
            revenue_cents,
        })
        .collect()
}

/// Revenue per category, highest first. Ties break on the category name.
pub fn sales_by_category(rows: &[SalesRow]) -> Vec<CategoryBucket> {
    let mut buckets: HashMap<&str, (i64, i64)> = HashMap::new();

    for row in rows {
        let category = row
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORIZED);
        let entry = buckets.entry(category).or_default();
        entry.0 += row.quantity;
        entry.1 += row.line_total_cents;
    }

    let mut result: Vec<CategoryBucket> = buckets
        .into_iter()
        .map(|(category, (quantity, revenue_cents))| CategoryBucket {
            category: category.to_string(),
            quantity,
            revenue_cents,
        })
        .collect();

    result.sort_by(|a, b| {
        b.revenue_cents
            .cmp(&a.revenue_cents)
            .then_with(|| a.category.cmp(&b.category))
    });
    result
}

/// Best-selling products by revenue, then name.
pub fn top_products(rows: &[SalesRow], limit: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<&str, ProductSales> = HashMap::new();

    for row in rows {
        let entry = by_product
            .entry(row.product_id.as_str())
            .or_insert_with(|| ProductSales {
                product_id: row.product_id.clone(),
                product_name: row.product_name.clone(),
                quantity: 0,
                revenue_cents: 0,
            });
        entry.quantity += row.quantity;
        entry.revenue_cents += row.line_total_cents;
    }

    let mut result: Vec<ProductSales> = by_product.into_values().collect();
    result.sort_by(|a, b| {
        b.revenue_cents
            .cmp(&a.revenue_cents)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    result.truncate(limit);
    result
}

pub fn summary(rows: &[SalesRow]) -> SalesSummary {
    let orders: HashSet<&str> = rows.iter().map(|r| r.order_id.as_str()).collect();
    let order_count = orders.len() as i64;
    let quantity = rows.iter().map(|r| r.quantity).sum();
    let revenue_cents: i64 = rows.iter().map(|r| r.line_total_cents).sum();

    SalesSummary {
        order_count,
        quantity,
        revenue_cents,
        average_order_cents: if order_count == 0 {
            0
        } else {
            revenue_cents / order_count
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(order: &str, y: i32, m: u32, d: u32, category: Option<&str>, product: &str, qty: i64, cents: i64) -> SalesRow {
        SalesRow {
            order_id: order.to_string(),
            created_at: Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
            category: category.map(str::to_string),
            product_id: product.to_string(),
            product_name: format!("Product {product}"),
            quantity: qty,
            line_total_cents: cents,
        }
    }

    fn sample() -> Vec<SalesRow> {
        vec![
            // Monday 2026-03-02
            row("o1", 2026, 3, 2, Some("Fasteners"), "p1", 10, 1_000),
            row("o1", 2026, 3, 2, Some("Pipes"), "p2", 2, 5_000),
            // Wednesday 2026-03-04
            row("o2", 2026, 3, 4, None, "p3", 1, 700),
            // Monday 2026-03-09
            row("o3", 2026, 3, 9, Some("Fasteners"), "p1", 5, 500),
            // April
            row("o4", 2026, 4, 1, Some("Pipes"), "p2", 1, 2_500),
        ]
    }

    #[test]
    fn test_sales_by_day() {
        let buckets = sales_by_period(&sample(), Granularity::Day);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].period_start, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(buckets[0].order_count, 1);
        assert_eq!(buckets[0].quantity, 12);
        assert_eq!(buckets[0].revenue_cents, 6_000);
    }

    #[test]
    fn test_sales_by_week_and_month() {
        let weeks = sales_by_period(&sample(), Granularity::Week);
        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[0].order_count, 2);
        assert_eq!(weeks[0].revenue_cents, 6_700);
        // 2026-04-01 is a Wednesday
        assert_eq!(weeks[2].period_start, NaiveDate::from_ymd_opt(2026, 3, 30).unwrap());

        let months = sales_by_period(&sample(), Granularity::Month);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].order_count, 3);
        assert_eq!(months[1].period_start, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
    }

    #[test]
    fn test_sales_by_category() {
        let buckets = sales_by_category(&sample());
        assert_eq!(buckets[0].category, "Pipes");
        assert_eq!(buckets[0].revenue_cents, 7_500);
        assert_eq!(buckets[1].category, "Fasteners");
        assert_eq!(buckets[2].category, UNCATEGORIZED);
    }

    #[test]
    fn test_top_products() {
        let top = top_products(&sample(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, "p2");
        assert_eq!(top[0].quantity, 3);
        assert_eq!(top[1].product_id, "p1");
        assert_eq!(top[1].revenue_cents, 1_500);
    }

    #[test]
    fn test_summary() {
        let s = summary(&sample());
        assert_eq!(s.order_count, 4);
        assert_eq!(s.quantity, 19);
        assert_eq!(s.revenue_cents, 9_700);
        assert_eq!(s.average_order_cents, 2_425);

        assert_eq!(summary(&[]), SalesSummary::default());
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("year".parse::<Granularity>().is_err());
    }
}
