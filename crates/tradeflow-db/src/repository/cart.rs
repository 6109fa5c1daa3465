//! # Cart Repository
//!
//! Persistent carts keyed by a signed-in user or by a guest session.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Lifecycle                                    │
//! │                                                                         │
//! │  get_or_create_active(org, branch, owner)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Active ──upsert_item / set_item_quantity / remove_item / clear──┐      │
//! │    │  ▲                                                          │      │
//! │    │  └──────────────────────────────────────────────────────────┘      │
//! │    │                                                                    │
//! │    ├── guest signs in ──► merge_guest_into_user                         │
//! │    │       guest lines folded into the user cart, guest → Abandoned     │
//! │    │                                                                    │
//! │    └── checkout ──► CheckedOut (inside the order transaction)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit price and tax rate are frozen on the line when it is first added.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tradeflow_core::cart::merge_quantities;
use tradeflow_core::{Cart, CartItem, CartOwner, CartStatus, Product};

const CART_COLUMNS: &str =
    "id, organization_id, branch_id, user_id, session_id, status, created_at, updated_at";
const ITEM_COLUMNS: &str =
    "id, cart_id, product_id, quantity, unit_price_cents, tax_rate_bps, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// The active cart of `owner` in `organization_id`, if any.
    pub async fn find_active(
        &self,
        organization_id: &str,
        owner: &CartOwner,
    ) -> DbResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        find_active_in(&mut conn, organization_id, owner).await
    }

    /// Returns the owner's active cart, creating an empty one if needed.
    /// When `branch_id` is given and differs from the cart's, the cart is moved
    /// to that branch.
    pub async fn get_or_create_active(
        &self,
        organization_id: &str,
        branch_id: Option<&str>,
        owner: &CartOwner,
    ) -> DbResult<Cart> {
        if let Some(mut cart) = self.find_active(organization_id, owner).await? {
            if let Some(branch) = branch_id {
                if cart.branch_id.as_deref() != Some(branch) {
                    self.set_branch(&cart.id, Some(branch)).await?;
                    cart.branch_id = Some(branch.to_string());
                }
            }
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            branch_id: branch_id.map(str::to_string),
            user_id: owner.user_id().map(str::to_string),
            session_id: owner.session_id().map(str::to_string),
            status: CartStatus::Active,
            created_at: now,
            updated_at: now,
        };

        debug!(cart_id = %cart.id, ?owner, "Creating cart");

        sqlx::query(
            r#"
            INSERT INTO carts (
                id, organization_id, branch_id, user_id, session_id, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.organization_id)
        .bind(&cart.branch_id)
        .bind(&cart.user_id)
        .bind(&cart.session_id)
        .bind(cart.status)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(cart)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?1");
        let cart = sqlx::query_as::<_, Cart>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cart)
    }

    /// Lines in the order they were added.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, cart_id).await
    }

    pub async fn get_item(&self, cart_id: &str, product_id: &str) -> DbResult<Option<CartItem>> {
        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 AND product_id = ?2");
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Sets the line for `product` to `quantity`, inserting it at the current
    /// catalog price if it is new. An existing line keeps its frozen price.
    pub async fn upsert_item(
        &self,
        cart_id: &str,
        product: &Product,
        quantity: i64,
    ) -> DbResult<CartItem> {
        let mut conn = self.pool.acquire().await?;
        upsert_item_in(
            &mut conn,
            cart_id,
            &product.id,
            quantity,
            product.price_cents,
            product.tax_rate_bps,
        )
        .await?;
        touch(&mut conn, cart_id).await?;

        debug!(cart_id = %cart_id, product_id = %product.id, quantity, "Cart line set");

        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 AND product_id = ?2");
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(cart_id)
            .bind(&product.id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(item)
    }

    /// Changes the quantity of an existing line. Zero removes the line.
    pub async fn set_item_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        if quantity <= 0 {
            return self.remove_item(cart_id, product_id).await;
        }

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?3, updated_at = ?4 WHERE cart_id = ?1 AND product_id = ?2",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", product_id));
        }
        let mut conn = self.pool.acquire().await?;
        touch(&mut conn, cart_id).await
    }

    pub async fn remove_item(&self, cart_id: &str, product_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1 AND product_id = ?2")
            .bind(cart_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", product_id));
        }
        let mut conn = self.pool.acquire().await?;
        touch(&mut conn, cart_id).await
    }

    /// Removes every line; the cart itself stays active.
    pub async fn clear(&self, cart_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        let mut conn = self.pool.acquire().await?;
        touch(&mut conn, cart_id).await?;
        Ok(result.rows_affected())
    }

    pub async fn set_branch(&self, cart_id: &str, branch_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE carts SET branch_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(cart_id)
            .bind(branch_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart", cart_id));
        }
        Ok(())
    }

    /// Folds a guest's active cart into the user's active cart.
    ///
    /// ## Behaviour
    /// - No guest cart: returns the user's active cart (if any), nothing changes
    /// - No user cart: the guest cart is re-owned by the user
    /// - Both: quantities are added line by line (capped by
    ///   [`merge_quantities`]); the user line's frozen price wins; the guest cart
    ///   is emptied and marked `Abandoned`
    ///
    /// Runs in one transaction.
    pub async fn merge_guest_into_user(
        &self,
        organization_id: &str,
        session_id: &str,
        user_id: &str,
    ) -> DbResult<Option<Cart>> {
        let guest_owner = CartOwner::Guest(session_id.to_string());
        let user_owner = CartOwner::User(user_id.to_string());

        let mut tx = self.pool.begin().await?;

        let guest = find_active_in(&mut tx, organization_id, &guest_owner).await?;
        let user_cart = find_active_in(&mut tx, organization_id, &user_owner).await?;

        let merged = match (guest, user_cart) {
            (None, user_cart) => user_cart,
            (Some(guest), None) => {
                sqlx::query(
                    "UPDATE carts SET user_id = ?2, session_id = NULL, updated_at = ?3 WHERE id = ?1",
                )
                .bind(&guest.id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
                find_active_in(&mut tx, organization_id, &user_owner).await?
            }
            (Some(guest), Some(user_cart)) => {
                let guest_items = items_in(&mut tx, &guest.id).await?;
                let existing = items_in(&mut tx, &user_cart.id).await?;

                for line in &guest_items {
                    let quantity = match existing.iter().find(|i| i.product_id == line.product_id) {
                        Some(current) => merge_quantities(current.quantity, line.quantity),
                        None => line.quantity,
                    };
                    upsert_item_in(
                        &mut tx,
                        &user_cart.id,
                        &line.product_id,
                        quantity,
                        line.unit_price_cents,
                        line.tax_rate_bps,
                    )
                    .await?;
                }

                sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
                    .bind(&guest.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE carts SET status = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&guest.id)
                    .bind(CartStatus::Abandoned)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                touch(&mut tx, &user_cart.id).await?;

                Some(user_cart)
            }
        };

        tx.commit().await?;

        if let Some(cart) = &merged {
            info!(cart_id = %cart.id, user_id = %user_id, "Guest cart merged");
        }
        Ok(merged)
    }

    /// Compare-and-set `Active → CheckedOut`.
    pub async fn mark_checked_out(&self, cart_id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        mark_checked_out_in(&mut conn, cart_id).await
    }
}

// =============================================================================
// Connection-level helpers (shared with the order transaction)
// =============================================================================

async fn find_active_in(
    conn: &mut SqliteConnection,
    organization_id: &str,
    owner: &CartOwner,
) -> DbResult<Option<Cart>> {
    let (filter, key) = match owner {
        CartOwner::User(id) => ("user_id = ?2", id),
        CartOwner::Guest(session) => ("session_id = ?2 AND user_id IS NULL", session),
    };
    let sql = format!(
        "SELECT {CART_COLUMNS} FROM carts
         WHERE organization_id = ?1 AND {filter} AND status = 'active'"
    );
    let cart = sqlx::query_as::<_, Cart>(&sql)
        .bind(organization_id)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(cart)
}

pub(crate) async fn items_in(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 ORDER BY created_at, rowid"
    );
    let items = sqlx::query_as::<_, CartItem>(&sql)
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

async fn upsert_item_in(
    conn: &mut SqliteConnection,
    cart_id: &str,
    product_id: &str,
    quantity: i64,
    unit_price_cents: i64,
    tax_rate_bps: u32,
) -> DbResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO cart_items (
            id, cart_id, product_id, quantity, unit_price_cents, tax_rate_bps, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT (cart_id, product_id) DO UPDATE SET
            quantity = excluded.quantity,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price_cents)
    .bind(tax_rate_bps)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn touch(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
        .bind(cart_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn mark_checked_out_in(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE carts SET status = 'checked_out', updated_at = ?2 WHERE id = ?1 AND status = 'active'",
    )
    .bind(cart_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Cart", cart_id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{fixture, new_product};

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let fx = fixture().await;
        let owner = CartOwner::User(fx.user.id.clone());

        let first = fx
            .db
            .carts()
            .get_or_create_active(&fx.org.id, None, &owner)
            .await
            .unwrap();
        let second = fx
            .db
            .carts()
            .get_or_create_active(&fx.org.id, Some(&fx.branch.id), &owner)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.branch_id.as_deref(), Some(fx.branch.id.as_str()));
        assert_eq!(second.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn test_line_operations() {
        let fx = fixture().await;
        let carts = fx.db.carts();
        let cart = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::Guest("sess-1".into()))
            .await
            .unwrap();

        let item = carts.upsert_item(&cart.id, &fx.product, 3).await.unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price_cents, fx.product.price_cents);

        carts.upsert_item(&cart.id, &fx.product, 5).await.unwrap();
        assert_eq!(carts.items(&cart.id).await.unwrap().len(), 1);
        assert_eq!(
            carts.get_item(&cart.id, &fx.product.id).await.unwrap().unwrap().quantity,
            5
        );

        carts.set_item_quantity(&cart.id, &fx.product.id, 0).await.unwrap();
        assert!(carts.items(&cart.id).await.unwrap().is_empty());

        let err = carts.remove_item(&cart.id, &fx.product.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_price_frozen_on_existing_line() {
        let fx = fixture().await;
        let carts = fx.db.carts();
        let cart = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::User(fx.user.id.clone()))
            .await
            .unwrap();
        carts.upsert_item(&cart.id, &fx.product, 1).await.unwrap();

        let mut repriced = fx.product.clone();
        repriced.price_cents += 500;
        let line = carts.upsert_item(&cart.id, &repriced, 2).await.unwrap();
        assert_eq!(line.unit_price_cents, fx.product.price_cents);
    }

    #[tokio::test]
    async fn test_merge_guest_into_user() {
        let fx = fixture().await;
        let carts = fx.db.carts();
        let other = new_product(&fx.org.id, "NUT-M8", "Hex Nut M8", 300);
        fx.db.products().insert(&other).await.unwrap();

        let guest = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::Guest("sess-1".into()))
            .await
            .unwrap();
        carts.upsert_item(&guest.id, &fx.product, 2).await.unwrap();
        carts.upsert_item(&guest.id, &other, 4).await.unwrap();

        let user_cart = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::User(fx.user.id.clone()))
            .await
            .unwrap();
        carts.upsert_item(&user_cart.id, &fx.product, 3).await.unwrap();

        let merged = carts
            .merge_guest_into_user(&fx.org.id, "sess-1", &fx.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.id, user_cart.id);

        let items = carts.items(&user_cart.id).await.unwrap();
        assert_eq!(items.len(), 2);
        let bolt = items.iter().find(|i| i.product_id == fx.product.id).unwrap();
        assert_eq!(bolt.quantity, 5);

        let guest_after = carts.get_by_id(&guest.id).await.unwrap().unwrap();
        assert_eq!(guest_after.status, CartStatus::Abandoned);
        assert!(carts.items(&guest.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_reowns_guest_cart_when_user_has_none() {
        let fx = fixture().await;
        let carts = fx.db.carts();
        let guest = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::Guest("sess-2".into()))
            .await
            .unwrap();
        carts.upsert_item(&guest.id, &fx.product, 1).await.unwrap();

        let merged = carts
            .merge_guest_into_user(&fx.org.id, "sess-2", &fx.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.id, guest.id);
        assert_eq!(merged.user_id.as_deref(), Some(fx.user.id.as_str()));
        assert!(merged.session_id.is_none());

        // No guest cart: nothing to do
        let none = carts
            .merge_guest_into_user(&fx.org.id, "unknown", &fx.user.id)
            .await
            .unwrap();
        assert_eq!(none.map(|c| c.id), Some(guest.id));
    }

    #[tokio::test]
    async fn test_mark_checked_out_once() {
        let fx = fixture().await;
        let carts = fx.db.carts();
        let cart = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::User(fx.user.id.clone()))
            .await
            .unwrap();

        carts.mark_checked_out(&cart.id).await.unwrap();
        let err = carts.mark_checked_out(&cart.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        // A new active cart can now be created for the same user
        let fresh = carts
            .get_or_create_active(&fx.org.id, None, &CartOwner::User(fx.user.id.clone()))
            .await
            .unwrap();
        assert_ne!(fresh.id, cart.id);
    }
}
