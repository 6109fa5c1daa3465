//! # Routes
//!
//! One module per resource. Handlers validate input, apply the rules from
//! `tradeflow-core`, call repositories and map entities to DTOs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /health                                    health                      │
//! │  /api/auth/login                            sessions                    │
//! │  /api/organizations[/{org_id}[/users]]      organizations               │
//! │  /api/.../branches, /api/branches/{id}      branches                    │
//! │  /api/.../products, /api/products/{id}      products                    │
//! │  /api/cart[/items[/{product_id}]|/checkout] cart                        │
//! │  /api/.../quotations, /api/quotations/{id}  quotations                  │
//! │  /api/.../orders, /api/orders/{id}          orders                      │
//! │  /api/.../invoices, /api/invoices/{id}      orders                      │
//! │  /api/organizations/{org_id}/zoho/...       zoho                        │
//! │  /api/organizations/{org_id}/analytics/...  analytics                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod analytics;
pub mod branches;
pub mod cart;
pub mod health;
pub mod orders;
pub mod organizations;
pub mod products;
pub mod quotations;
pub mod sessions;
pub mod zoho;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/login", post(sessions::login))
        // Organizations & users
        .route("/api/organizations", post(organizations::register))
        .route(
            "/api/organizations/{org_id}",
            get(organizations::get_organization).patch(organizations::update_organization),
        )
        .route(
            "/api/organizations/{org_id}/users",
            get(organizations::list_users).post(organizations::create_user),
        )
        // Branches
        .route(
            "/api/organizations/{org_id}/branches",
            get(branches::list_branches).post(branches::create_branch),
        )
        .route(
            "/api/branches/{id}",
            get(branches::get_branch)
                .patch(branches::update_branch)
                .delete(branches::deactivate_branch),
        )
        .route("/api/branches/{id}/zoho-sync", post(branches::sync_branch))
        // Catalog
        .route(
            "/api/organizations/{org_id}/products",
            get(products::search_products).post(products::create_product),
        )
        .route(
            "/api/organizations/{org_id}/products/categories",
            get(products::list_categories),
        )
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        // Cart
        .route("/api/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route(
            "/api/cart/items/{product_id}",
            patch(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/api/cart/checkout", post(cart::checkout))
        // Quotations
        .route(
            "/api/organizations/{org_id}/quotations",
            get(quotations::list_quotations).post(quotations::create_quotation),
        )
        .route("/api/quotations/{id}", get(quotations::get_quotation))
        .route("/api/quotations/{id}/send", post(quotations::send_quotation))
        .route("/api/quotations/{id}/approve", post(quotations::approve_quotation))
        .route("/api/quotations/{id}/reject", post(quotations::reject_quotation))
        .route("/api/quotations/{id}/convert", post(quotations::convert_quotation))
        // Orders & invoices
        .route("/api/organizations/{org_id}/orders", get(orders::list_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/status", post(orders::change_status))
        .route("/api/orders/{id}/zoho-sync", post(orders::sync_order))
        .route("/api/organizations/{org_id}/invoices", get(orders::list_invoices))
        .route("/api/invoices/{id}", get(orders::get_invoice))
        // Zoho
        .route(
            "/api/organizations/{org_id}/zoho",
            get(zoho::status).delete(zoho::disconnect),
        )
        .route("/api/organizations/{org_id}/zoho/connect", post(zoho::connect))
        .route(
            "/api/organizations/{org_id}/zoho/import-products",
            post(zoho::import_products),
        )
        .route(
            "/api/organizations/{org_id}/zoho/sync-pending",
            post(zoho::sync_pending),
        )
        // Analytics
        .route(
            "/api/organizations/{org_id}/analytics/summary",
            get(analytics::summary),
        )
        .route("/api/organizations/{org_id}/analytics/sales", get(analytics::sales))
        .route(
            "/api/organizations/{org_id}/analytics/categories",
            get(analytics::categories),
        )
        .route(
            "/api/organizations/{org_id}/analytics/top-products",
            get(analytics::top_products),
        )
}

// =============================================================================
// Test helpers
// =============================================================================
