//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Filtered search (text, category, active flag) with paging
//! - CRUD with duplicate SKU / slug detection
//! - Stock adjustments
//! - Upsert of items imported from Zoho Inventory
//!
//! ## Zoho Import Matching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ZohoItemSnapshot { item_id, sku, name, rate, ... }                     │
//! │       │                                                                 │
//! │       ├── product with zoho_item_id = item_id?  ──► update (Updated)    │
//! │       ├── product with sku = item.sku?          ──► link + update       │
//! │       └── otherwise                             ──► insert (Created)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tradeflow_core::validation::slugify;
use tradeflow_core::Product;

const COLUMNS: &str = r#"
    id, organization_id, sku, slug, name, description, category, unit,
    price_cents, tax_rate_bps, min_order_quantity, max_order_quantity,
    stock_quantity, zoho_item_id, is_active, created_at, updated_at
"#;

/// Search parameters for [`ProductRepository::search`].
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub organization_id: String,
    /// Matched against SKU and name (case-insensitive substring).
    pub query: Option<String>,
    pub category: Option<String>,
    pub include_inactive: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ProductFilter {
    pub fn new(organization_id: impl Into<String>) -> Self {
        ProductFilter {
            organization_id: organization_id.into(),
            query: None,
            category: None,
            include_inactive: false,
            limit: 50,
            offset: 0,
        }
    }

    fn like_pattern(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.to_lowercase()))
    }
}

/// An item as reported by Zoho, reduced to what the catalog stores.
#[derive(Debug, Clone)]
pub struct ZohoItemSnapshot {
    pub item_id: String,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub rate_cents: i64,
    pub tax_rate_bps: u32,
    pub unit: Option<String>,
    pub stock_on_hand: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product. Duplicate SKU or slug within the organization yields
    /// `UniqueViolation` naming the offending field.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, organization_id, sku, slug, name, description, category, unit,
                price_cents, tax_rate_bps, min_order_quantity, max_order_quantity,
                stock_quantity, zoho_item_id, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.organization_id)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.min_order_quantity)
        .bind(product.max_order_quantity)
        .bind(product.stock_quantity)
        .bind(&product.zoho_item_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_field(e, product))?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, organization_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE organization_id = ?1 AND sku = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_slug(&self, organization_id: &str, slug: &str) -> DbResult<Option<Product>> {
        let sql =
            format!("SELECT {COLUMNS} FROM products WHERE organization_id = ?1 AND slug = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Filtered, paged catalog listing ordered by name.
    pub async fn search(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        debug!(
            organization_id = %filter.organization_id,
            query = ?filter.query,
            category = ?filter.category,
            limit = filter.limit,
            "Searching products"
        );

        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM products
            WHERE organization_id = ?1
              AND (?2 IS NULL OR lower(name) LIKE ?2 OR lower(sku) LIKE ?2)
              AND (?3 IS NULL OR category = ?3)
              AND (?4 OR is_active = 1)
            ORDER BY name
            LIMIT ?5 OFFSET ?6
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&filter.organization_id)
            .bind(filter.like_pattern())
            .bind(&filter.category)
            .bind(filter.include_inactive)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Number of products matching `filter`, ignoring limit / offset.
    pub async fn count(&self, filter: &ProductFilter) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products
            WHERE organization_id = ?1
              AND (?2 IS NULL OR lower(name) LIKE ?2 OR lower(sku) LIKE ?2)
              AND (?3 IS NULL OR category = ?3)
              AND (?4 OR is_active = 1)
            "#,
        )
        .bind(&filter.organization_id)
        .bind(filter.like_pattern())
        .bind(&filter.category)
        .bind(filter.include_inactive)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Distinct categories of active products, sorted.
    pub async fn categories(&self, organization_id: &str) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT category FROM products
            WHERE organization_id = ?1 AND is_active = 1
              AND category IS NOT NULL AND category <> ''
            ORDER BY category
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Writes every editable field of `product`.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2, slug = ?3, name = ?4, description = ?5, category = ?6,
                unit = ?7, price_cents = ?8, tax_rate_bps = ?9,
                min_order_quantity = ?10, max_order_quantity = ?11,
                stock_quantity = ?12, zoho_item_id = ?13, is_active = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.min_order_quantity)
        .bind(product.max_order_quantity)
        .bind(product.stock_quantity)
        .bind(&product.zoho_item_id)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_field(e, product))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }
        Ok(())
    }

    /// Marks the product inactive. Order history keeps its snapshot.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }

    /// Adds `delta` to tracked stock. Untracked products (`NULL`) are left alone.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Option<i64>> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock_quantity = CASE WHEN stock_quantity IS NULL THEN NULL
                                      ELSE stock_quantity + ?2 END,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(stock)
    }

    pub async fn get_by_zoho_item_id(
        &self,
        organization_id: &str,
        item_id: &str,
    ) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM products WHERE organization_id = ?1 AND zoho_item_id = ?2"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Creates or refreshes a product from a Zoho item.
    ///
    /// Local fields Zoho knows nothing about (category, order quantity bounds)
    /// are preserved on update.
    pub async fn upsert_from_zoho(
        &self,
        organization_id: &str,
        item: &ZohoItemSnapshot,
    ) -> DbResult<(Product, UpsertOutcome)> {
        let existing = match self.get_by_zoho_item_id(organization_id, &item.item_id).await? {
            Some(product) => Some(product),
            None => match item.sku.as_deref().filter(|s| !s.trim().is_empty()) {
                Some(sku) => self.get_by_sku(organization_id, sku).await?,
                None => None,
            },
        };

        if let Some(mut product) = existing {
            product.name = item.name.clone();
            product.description = item.description.clone().or(product.description);
            product.price_cents = item.rate_cents;
            product.tax_rate_bps = item.tax_rate_bps;
            if let Some(unit) = &item.unit {
                product.unit = unit.clone();
            }
            if product.stock_quantity.is_some() || item.stock_on_hand.is_some() {
                product.stock_quantity = item.stock_on_hand;
            }
            product.zoho_item_id = Some(item.item_id.clone());
            product.is_active = true;

            self.update(&product).await?;
            debug!(product_id = %product.id, zoho_item_id = %item.item_id, "Product refreshed from Zoho");
            return Ok((product, UpsertOutcome::Updated));
        }

        let now = Utc::now();
        let sku = item
            .sku
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("ZOHO-{}", item.item_id));
        let mut slug = slugify(&item.name);
        if slug.is_empty() || self.get_by_slug(organization_id, &slug).await?.is_some() {
            slug = slugify(&format!("{} {}", item.name, sku));
        }

        let product = Product {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            sku,
            slug,
            name: item.name.clone(),
            description: item.description.clone(),
            category: None,
            unit: item.unit.clone().unwrap_or_else(|| "pcs".to_string()),
            price_cents: item.rate_cents,
            tax_rate_bps: item.tax_rate_bps,
            min_order_quantity: 1,
            max_order_quantity: None,
            stock_quantity: item.stock_on_hand,
            zoho_item_id: Some(item.item_id.clone()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert(&product).await?;
        debug!(product_id = %product.id, zoho_item_id = %item.item_id, "Product created from Zoho");
        Ok((product, UpsertOutcome::Created))
    }
}

/// Maps a UNIQUE failure onto the column that collided.
fn duplicate_field(err: sqlx::Error, product: &Product) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field == "slug" => {
            DbError::duplicate("slug", &product.slug)
        }
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
