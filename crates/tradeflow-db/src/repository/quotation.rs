//! # Quotation Repository
//!
//! Priced proposals. Lines are snapshots of the product at quoting time; the
//! header carries frozen totals.
//!
//! Status changes are compare-and-set on the current status so that two
//! concurrent approvals cannot both succeed.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::{Quotation, QuotationItem, QuotationStatus};

const COLUMNS: &str = r#"
    id, organization_id, branch_id, created_by, quotation_number, status,
    subtotal_cents, discount_cents, tax_cents, total_cents, valid_until,
    notes, order_id, created_at, updated_at
"#;
const ITEM_COLUMNS: &str = r#"
    id, quotation_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
    quantity, discount_bps, tax_rate_bps, line_total_cents
"#;

#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    /// Inserts the header and all lines in one transaction.
    pub async fn create(&self, quotation: &Quotation, items: &[QuotationItem]) -> DbResult<()> {
        debug!(
            id = %quotation.id,
            number = %quotation.quotation_number,
            lines = items.len(),
            "Creating quotation"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, organization_id, branch_id, created_by, quotation_number, status,
                subtotal_cents, discount_cents, tax_cents, total_cents, valid_until,
                notes, order_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&quotation.id)
        .bind(&quotation.organization_id)
        .bind(&quotation.branch_id)
        .bind(&quotation.created_by)
        .bind(&quotation.quotation_number)
        .bind(quotation.status)
        .bind(quotation.subtotal_cents)
        .bind(quotation.discount_cents)
        .bind(quotation.tax_cents)
        .bind(quotation.total_cents)
        .bind(quotation.valid_until)
        .bind(&quotation.notes)
        .bind(&quotation.order_id)
        .bind(quotation.created_at)
        .bind(quotation.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO quotation_items (
                    id, quotation_id, product_id, sku_snapshot, name_snapshot,
                    unit_price_cents, quantity, discount_bps, tax_rate_bps, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.quotation_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.discount_bps)
            .bind(item.tax_rate_bps)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Quotation>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    pub async fn items(&self, quotation_id: &str) -> DbResult<Vec<QuotationItem>> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, quotation_id).await
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(
        &self,
        organization_id: &str,
        status: Option<QuotationStatus>,
    ) -> DbResult<Vec<Quotation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM quotations
             WHERE organization_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC"
        );
        let quotations = sqlx::query_as::<_, Quotation>(&sql)
            .bind(organization_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(quotations)
    }

    /// Moves `id` from `from` to `to`. Fails with `Conflict` if the stored status
    /// is no longer `from`.
    pub async fn set_status(
        &self,
        id: &str,
        from: QuotationStatus,
        to: QuotationStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE quotations SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.get_by_id(id).await? {
                Some(_) => DbError::conflict("Quotation", id),
                None => DbError::not_found("Quotation", id),
            });
        }

        info!(quotation_id = %id, from = from.as_str(), to = to.as_str(), "Quotation status changed");
        Ok(())
    }

    /// `Approved → Converted` with the resulting order id.
    pub async fn mark_converted(&self, id: &str, order_id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        mark_converted_in(&mut conn, id, order_id).await
    }
}

// =============================================================================
// Connection-level helpers (shared with the order transaction)
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Quotation>> {
    let sql = format!("SELECT {COLUMNS} FROM quotations WHERE id = ?1");
    let quotation = sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(quotation)
}

pub(crate) async fn items_in(
    conn: &mut SqliteConnection,
    quotation_id: &str,
) -> DbResult<Vec<QuotationItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM quotation_items WHERE quotation_id = ?1 ORDER BY rowid");
    let items = sqlx::query_as::<_, QuotationItem>(&sql)
        .bind(quotation_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

pub(crate) async fn mark_converted_in(
    conn: &mut SqliteConnection,
    id: &str,
    order_id: &str,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE quotations SET status = 'converted', order_id = ?2, updated_at = ?3
        WHERE id = ?1 AND status = 'approved'
        "#,
    )
    .bind(id)
    .bind(order_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Quotation", id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
