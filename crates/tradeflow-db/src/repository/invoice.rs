//! # Invoice Repository
//!
//! One invoice per order (`order_id` is unique). Invoices are issued in Zoho
//! Books from the order's sales order; this table keeps the local mirror so the
//! portal can list them without calling Zoho.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::{Invoice, InvoiceStatus};

const COLUMNS: &str = r#"
    id, organization_id, order_id, invoice_number, status, total_cents,
    balance_cents, due_date, zoho_invoice_id, issued_at, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, order_id = %invoice.order_id, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, organization_id, order_id, invoice_number, status, total_cents,
                balance_cents, due_date, zoho_invoice_id, issued_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.organization_id)
        .bind(&invoice.order_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status)
        .bind(invoice.total_cents)
        .bind(invoice.balance_cents)
        .bind(invoice.due_date)
        .bind(&invoice.zoho_invoice_id)
        .bind(invoice.issued_at)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("order_id", &invoice.order_id),
            other => other,
        })?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice recorded"
        );
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {COLUMNS} FROM invoices WHERE order_id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    pub async fn list(
        &self,
        organization_id: &str,
        status: Option<InvoiceStatus>,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM invoices
             WHERE organization_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(organization_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Updates status and outstanding balance. `issued_at` is stamped the
    /// first time the invoice leaves `Draft`.
    pub async fn set_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        balance_cents: i64,
    ) -> DbResult<()> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                status = ?2,
                balance_cents = ?3,
                issued_at = CASE WHEN ?2 <> 'draft' AND issued_at IS NULL THEN ?4 ELSE issued_at END,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(balance_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        debug!(invoice_id = %id, status = status.as_str(), "Invoice status updated");
        Ok(())
    }
}
