//! # Order Repository
//!
//! Orders are created from a cart or from an approved quotation, each in a
//! single transaction, and are immutable afterwards except for their status and
//! the Zoho mirror fields.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    1. load cart (must be Active, same organization)                     │
//! │    2. load lines; empty → CoreError::EmptyCart                          │
//! │    3. per line: load product, check_order_quantity (min/max/stock)      │
//! │    4. price lines, Totals::from_lines                                   │
//! │    5. INSERT orders + order_items (sku/name/category/price snapshot)    │
//! │    6. decrement tracked stock                                           │
//! │    7. cart → CheckedOut                                                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure rolls back everything: no half-created orders, no stock    │
//! │  drift, the cart stays usable.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Zoho Mirror Fields
//! ```text
//!   not_synced ──record_zoho_sales_order──► (sales order id stored)
//!        │                                        │
//!        │                                  mark_zoho_synced
//!        ▼                                        ▼
//!     failed ◄──record_zoho_failure──────────  synced
//!        │
//!        └── picked up again by pending_zoho_sync
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{cart, quotation};
use tradeflow_core::analytics::SalesRow;
use tradeflow_core::cart::{check_order_quantity, PricedLine, Totals};
use tradeflow_core::numbering;
use tradeflow_core::{
    CartStatus, CoreError, Money, Order, OrderItem, OrderSource, OrderStatus, Product,
    QuotationStatus, TaxRate, ZohoSyncStatus,
};

const COLUMNS: &str = r#"
    id, organization_id, branch_id, user_id, order_number, status, source,
    quotation_id, subtotal_cents, discount_cents, tax_cents, total_cents, notes,
    zoho_sales_order_id, zoho_sales_order_number, zoho_sync_status,
    zoho_sync_error, zoho_synced_at, created_at, updated_at
"#;
const ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, sku_snapshot, name_snapshot, category_snapshot,
    unit_price_cents, quantity, discount_cents, tax_rate_bps, tax_cents, line_total_cents
"#;
const PRODUCT_COLUMNS: &str = r#"
    id, organization_id, sku, slug, name, description, category, unit,
    price_cents, tax_rate_bps, min_order_quantity, max_order_quantity,
    stock_quantity, zoho_item_id, is_active, created_at, updated_at
"#;

/// Header data for a checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub organization_id: String,
    pub branch_id: String,
    pub user_id: String,
    pub notes: Option<String>,
}

/// Parameters for [`OrderRepository::list`].
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub organization_id: String,
    pub branch_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl OrderFilter {
    pub fn new(organization_id: impl Into<String>) -> Self {
        OrderFilter {
            organization_id: organization_id.into(),
            branch_id: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Turns the cart into an order in one transaction (see module docs).
    pub async fn create_from_cart(
        &self,
        cart_id: &str,
        new_order: &NewOrder,
    ) -> DbResult<(Order, Vec<OrderItem>)> {
        let mut tx = self.pool.begin().await?;

        let cart_sql = "SELECT organization_id, status FROM carts WHERE id = ?1";
        let (cart_org, cart_status): (String, CartStatus) = sqlx::query_as(cart_sql)
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", cart_id))?;

        if cart_org != new_order.organization_id {
            return Err(DbError::not_found("Cart", cart_id));
        }
        if cart_status != CartStatus::Active {
            return Err(DbError::conflict("Cart", cart_id));
        }

        let cart_items = cart::items_in(&mut tx, cart_id).await?;
        if cart_items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let mut priced = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = product_in(&mut tx, &item.product_id).await?;
            check_order_quantity(&product, item.quantity)?;
            priced.push((PricedLine::from_cart_item(item, &product), product));
        }

        let (order, items) = build_order(
            &new_order.organization_id,
            &new_order.branch_id,
            &new_order.user_id,
            OrderSource::Cart,
            None,
            new_order.notes.clone(),
            &priced,
        );

        insert_in(&mut tx, &order, &items).await?;
        for (line, product) in &priced {
            decrement_stock_in(&mut tx, product, line.quantity).await?;
        }
        cart::mark_checked_out_in(&mut tx, cart_id).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            lines = items.len(),
            "Order created from cart"
        );
        Ok((order, items))
    }

    /// Converts an approved quotation into an order in one transaction and
    /// marks the quotation `Converted`. Quoted prices and discounts are kept.
    pub async fn create_from_quotation(
        &self,
        quotation_id: &str,
        user_id: &str,
    ) -> DbResult<(Order, Vec<OrderItem>)> {
        let mut tx = self.pool.begin().await?;

        let quotation = quotation::get_in(&mut tx, quotation_id)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;

        if quotation.status != QuotationStatus::Approved {
            return Err(CoreError::InvalidStatusTransition {
                entity: "Quotation",
                from: quotation.status.to_string(),
                to: QuotationStatus::Converted.to_string(),
            }
            .into());
        }

        let quoted = quotation::items_in(&mut tx, quotation_id).await?;
        if quoted.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let mut priced = Vec::with_capacity(quoted.len());
        for item in &quoted {
            let product = product_in(&mut tx, &item.product_id).await?;
            if let Some(available) = product.stock_quantity {
                if item.quantity > available {
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku.clone(),
                        available,
                        requested: item.quantity,
                    }
                    .into());
                }
            }
            let line = PricedLine {
                product_id: item.product_id.clone(),
                sku: item.sku_snapshot.clone(),
                name: item.name_snapshot.clone(),
                unit_price: Money::from_cents(item.unit_price_cents),
                tax_rate: TaxRate::from_bps(item.tax_rate_bps),
                quantity: item.quantity,
                discount_bps: item.discount_bps,
            };
            priced.push((line, product));
        }

        let (order, items) = build_order(
            &quotation.organization_id,
            &quotation.branch_id,
            user_id,
            OrderSource::Quotation,
            Some(quotation.id.clone()),
            quotation.notes.clone(),
            &priced,
        );

        insert_in(&mut tx, &order, &items).await?;
        for (line, product) in &priced {
            decrement_stock_in(&mut tx, product, line.quantity).await?;
        }
        quotation::mark_converted_in(&mut tx, quotation_id, &order.id).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            quotation_id = %quotation_id,
            total = %order.total(),
            "Quotation converted to order"
        );
        Ok((order, items))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM orders
            WHERE organization_id = ?1
              AND (?2 IS NULL OR branch_id = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY created_at DESC
            LIMIT ?4 OFFSET ?5
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(&filter.organization_id)
            .bind(&filter.branch_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Compare-and-set status change. Cancelling restores tracked stock.
    pub async fn set_status(&self, id: &str, from: OrderStatus, to: OrderStatus) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => DbError::conflict("Order", id),
                None => DbError::not_found("Order", id),
            });
        }

        if to == OrderStatus::Cancelled {
            sqlx::query(
                r#"
                UPDATE products SET stock_quantity = stock_quantity + (
                    SELECT SUM(oi.quantity) FROM order_items oi
                    WHERE oi.order_id = ?1 AND oi.product_id = products.id
                )
                WHERE stock_quantity IS NOT NULL
                  AND id IN (SELECT product_id FROM order_items WHERE order_id = ?1)
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(order_id = %id, from = from.as_str(), to = to.as_str(), "Order status changed");
        Ok(())
    }

    // =========================================================================
    // Zoho mirror
    // =========================================================================

    pub async fn record_zoho_sales_order(
        &self,
        id: &str,
        sales_order_id: &str,
        sales_order_number: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                zoho_sales_order_id = ?2,
                zoho_sales_order_number = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(sales_order_id)
        .bind(sales_order_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        debug!(order_id = %id, zoho_sales_order_id = %sales_order_id, "Zoho sales order recorded");
        Ok(())
    }

    pub async fn record_zoho_failure(&self, id: &str, message: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                zoho_sync_status = ?2,
                zoho_sync_error = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(ZohoSyncStatus::Failed)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        warn!(order_id = %id, error = %message, "Zoho sync failure recorded");
        Ok(())
    }

    pub async fn mark_zoho_synced(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                zoho_sync_status = ?2,
                zoho_sync_error = NULL,
                zoho_synced_at = ?3,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(ZohoSyncStatus::Synced)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Orders that still need mirroring: not synced or failed, not cancelled,
    /// oldest first.
    pub async fn pending_zoho_sync(&self, organization_id: &str, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM orders
            WHERE organization_id = ?1
              AND zoho_sync_status IN ('not_synced', 'failed')
              AND status <> 'cancelled'
            ORDER BY created_at
            LIMIT ?2
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(organization_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    // =========================================================================
    // Analytics feed
    // =========================================================================

    /// One row per order line of non-cancelled orders created in `[from, to)`.
    pub async fn sales_rows(
        &self,
        organization_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<SalesRow>> {
        let rows = sqlx::query_as::<_, SalesRow>(
            r#"
            SELECT
                o.id AS order_id,
                o.created_at AS created_at,
                oi.category_snapshot AS category,
                oi.product_id AS product_id,
                oi.name_snapshot AS product_name,
                oi.quantity AS quantity,
                oi.line_total_cents AS line_total_cents
            FROM order_items oi
            INNER JOIN orders o ON o.id = oi.order_id
            WHERE o.organization_id = ?1
              AND o.status <> 'cancelled'
              AND (?2 IS NULL OR o.created_at >= ?2)
              AND (?3 IS NULL OR o.created_at < ?3)
            ORDER BY o.created_at
            "#,
        )
        .bind(organization_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn product_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    sqlx::query_as::<_, Product>(&sql)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
}

/// Snapshot lines into an order header + items.
fn build_order(
    organization_id: &str,
    branch_id: &str,
    user_id: &str,
    source: OrderSource,
    quotation_id: Option<String>,
    notes: Option<String>,
    priced: &[(PricedLine, Product)],
) -> (Order, Vec<OrderItem>) {
    let now = Utc::now();
    let order_id = Uuid::new_v4().to_string();
    let lines: Vec<PricedLine> = priced.iter().map(|(line, _)| line.clone()).collect();
    let totals = Totals::from_lines(&lines);

    let items = priced
        .iter()
        .map(|(line, product)| OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            product_id: line.product_id.clone(),
            sku_snapshot: line.sku.clone(),
            name_snapshot: line.name.clone(),
            category_snapshot: product.category.clone(),
            unit_price_cents: line.unit_price.cents(),
            quantity: line.quantity,
            discount_cents: line.line_discount().cents(),
            tax_rate_bps: line.tax_rate.bps(),
            tax_cents: line.line_tax().cents(),
            line_total_cents: line.line_total().cents(),
        })
        .collect();

    let order = Order {
        id: order_id,
        organization_id: organization_id.to_string(),
        branch_id: branch_id.to_string(),
        user_id: user_id.to_string(),
        order_number: numbering::order_number(now),
        status: OrderStatus::Pending,
        source,
        quotation_id,
        subtotal_cents: totals.subtotal.cents(),
        discount_cents: totals.discount.cents(),
        tax_cents: totals.tax.cents(),
        total_cents: totals.total.cents(),
        notes,
        zoho_sales_order_id: None,
        zoho_sales_order_number: None,
        zoho_sync_status: ZohoSyncStatus::NotSynced,
        zoho_sync_error: None,
        zoho_synced_at: None,
        created_at: now,
        updated_at: now,
    };

    (order, items)
}

async fn insert_in(conn: &mut SqliteConnection, order: &Order, items: &[OrderItem]) -> DbResult<()> {
    debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, organization_id, branch_id, user_id, order_number, status, source,
            quotation_id, subtotal_cents, discount_cents, tax_cents, total_cents, notes,
            zoho_sales_order_id, zoho_sales_order_number, zoho_sync_status,
            zoho_sync_error, zoho_synced_at, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16,
            ?17, ?18, ?19, ?20
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.organization_id)
    .bind(&order.branch_id)
    .bind(&order.user_id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(order.source)
    .bind(&order.quotation_id)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.tax_cents)
    .bind(order.total_cents)
    .bind(&order.notes)
    .bind(&order.zoho_sales_order_id)
    .bind(&order.zoho_sales_order_number)
    .bind(order.zoho_sync_status)
    .bind(&order.zoho_sync_error)
    .bind(order.zoho_synced_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, sku_snapshot, name_snapshot, category_snapshot,
                unit_price_cents, quantity, discount_cents, tax_rate_bps, tax_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(&item.category_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.discount_cents)
        .bind(item.tax_rate_bps)
        .bind(item.tax_cents)
        .bind(item.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Decrements tracked stock, refusing to go below zero.
async fn decrement_stock_in(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
) -> DbResult<()> {
    let Some(available) = product.stock_quantity else {
        return Ok(());
    };

    let result = sqlx::query(
        r#"
        UPDATE products SET stock_quantity = stock_quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND stock_quantity >= ?2
        "#,
    )
    .bind(&product.id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            available,
            requested: quantity,
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
