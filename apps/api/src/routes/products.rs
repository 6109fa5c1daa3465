//! Catalog.
//!
//! Reads are public so guest carts can browse; inactive products are only
//! listed for catalog managers of the owning organization. Writes need the
//! manager role.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{optional_user, AuthUser};
use crate::dto::{CreateProductRequest, ProductDto, ProductPage, ProductQuery, UpdateProductRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use tradeflow_core::validation::{
    slugify, validate_name, validate_price_cents, validate_sku, validate_slug,
    validate_tax_rate_bps,
};
use tradeflow_core::{Product, ValidationError};
use tradeflow_db::ProductFilter;

const DEFAULT_UNIT: &str = "pcs";
const MAX_PAGE_SIZE: i64 = 200;

fn is_manager_of(headers: &HeaderMap, state: &AppState, organization_id: &str) -> bool {
    optional_user(headers, &state.jwt)
        .map(|u| u.organization_id == organization_id && u.role.can_manage_catalog())
        .unwrap_or(false)
}

fn check_quantity_rules(product: &Product) -> ApiResult<()> {
    if product.min_order_quantity < 1 {
        return Err(ValidationError::MustBePositive {
            field: "min_order_quantity".to_string(),
        }
        .into());
    }
    if let Some(max) = product.max_order_quantity {
        if max < product.min_order_quantity {
            return Err(ApiError::validation(
                "max_order_quantity must not be below min_order_quantity",
            ));
        }
    }
    if matches!(product.stock_quantity, Some(stock) if stock < 0) {
        return Err(ApiError::validation("stock_quantity cannot be negative"));
    }
    Ok(())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn load_product(state: &AppState, id: &str) -> ApiResult<Product> {
    state
        .db
        .products()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))
}

/// `POST /api/organizations/{org_id}/products`
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductDto>)> {
    user.require_org(&org_id)?;
    user.require_catalog_manager()?;

    let sku = request.sku.trim().to_uppercase();
    validate_sku(&sku)?;
    validate_name("name", &request.name, 200)?;
    validate_price_cents(request.price_cents)?;
    validate_tax_rate_bps(request.tax_rate_bps)?;

    let slug = match optional_text(request.slug) {
        Some(slug) => slug,
        None => slugify(&format!("{} {}", request.name, sku)),
    };
    validate_slug(&slug)?;

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id,
        sku,
        slug,
        name: request.name.trim().to_string(),
        description: optional_text(request.description),
        category: optional_text(request.category),
        unit: optional_text(request.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        price_cents: request.price_cents,
        tax_rate_bps: request.tax_rate_bps,
        min_order_quantity: request.min_order_quantity.unwrap_or(1),
        max_order_quantity: request.max_order_quantity,
        stock_quantity: request.stock_quantity,
        zoho_item_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    check_quantity_rules(&product)?;

    state.db.products().insert(&product).await?;
    info!(product_id = %product.id, sku = %product.sku, "Product created");

    Ok((StatusCode::CREATED, Json(ProductDto::from(product))))
}

/// `GET /api/organizations/{org_id}/products?q=&category=&limit=&offset=`
pub async fn search_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<ProductPage>> {
    let mut filter = ProductFilter::new(&org_id);
    filter.query = query.q;
    filter.category = optional_text(query.category);
    filter.include_inactive = query.include_inactive && is_manager_of(&headers, &state, &org_id);
    if let Some(limit) = query.limit {
        filter.limit = limit.clamp(1, MAX_PAGE_SIZE);
    }
    filter.offset = query.offset.unwrap_or(0).max(0);

    let total = state.db.products().count(&filter).await?;
    let items = state.db.products().search(&filter).await?;

    Ok(Json(ProductPage {
        items: items.into_iter().map(ProductDto::from).collect(),
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// `GET /api/organizations/{org_id}/products/categories`
pub async fn list_categories(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.db.products().categories(&org_id).await?))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductDto>> {
    let product = load_product(&state, &id).await?;
    if !product.is_active && !is_manager_of(&headers, &state, &product.organization_id) {
        return Err(ApiError::not_found("Product", &id));
    }
    Ok(Json(ProductDto::from(product)))
}

/// `PATCH /api/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Json<ProductDto>> {
    let mut product = load_product(&state, &id).await?;
    user.require_org(&product.organization_id)?;
    user.require_catalog_manager()?;

    if let Some(name) = request.name {
        validate_name("name", &name, 200)?;
        product.name = name.trim().to_string();
    }
    if let Some(slug) = request.slug {
        let slug = slug.trim().to_string();
        validate_slug(&slug)?;
        product.slug = slug;
    }
    if request.description.is_some() {
        product.description = optional_text(request.description);
    }
    if request.category.is_some() {
        product.category = optional_text(request.category);
    }
    if let Some(unit) = optional_text(request.unit) {
        product.unit = unit;
    }
    if let Some(price) = request.price_cents {
        validate_price_cents(price)?;
        product.price_cents = price;
    }
    if let Some(bps) = request.tax_rate_bps {
        validate_tax_rate_bps(bps)?;
        product.tax_rate_bps = bps;
    }
    if let Some(min) = request.min_order_quantity {
        product.min_order_quantity = min;
    }
    if request.max_order_quantity.is_some() {
        product.max_order_quantity = request.max_order_quantity;
    }
    if request.stock_quantity.is_some() {
        product.stock_quantity = request.stock_quantity;
    }
    check_quantity_rules(&product)?;

    state.db.products().update(&product).await?;
    Ok(Json(ProductDto::from(load_product(&state, &id).await?)))
}

/// `DELETE /api/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let product = load_product(&state, &id).await?;
    user.require_org(&product.organization_id)?;
    user.require_catalog_manager()?;

    state.db.products().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_search() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        app.create_product(&reg, "bolt-m8", 1250, Some(100)).await;
        app.create_product(&reg, "NUT-M8", 300, None).await;

        let uri = format!("/api/organizations/{}/products", reg.organization_id);
        let (status, body) = app.call(Method::GET, &format!("{uri}?q=bolt"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["sku"], "BOLT-M8");
        assert_eq!(body["items"][0]["price"], "12.50");

        let (_, body) = app.call(Method::GET, &format!("{uri}?limit=1"), None, None).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (_, body) = app.call(Method::GET, &format!("{uri}/categories"), None, None).await;
        assert_eq!(body, json!(["Fasteners"]));
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        app.create_product(&reg, "BOLT-M8", 1250, None).await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/organizations/{}/products", reg.organization_id),
                Some(&reg.token),
                Some(json!({ "sku": "BOLT-M8", "name": "Another", "price_cents": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let uri = format!("/api/organizations/{}/products", reg.organization_id);

        let (status, _) = app
            .call(
                Method::POST,
                &uri,
                Some(&reg.token),
                Some(json!({ "sku": "X 1", "name": "Bad", "price_cents": 100 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                Method::POST,
                &uri,
                Some(&reg.token),
                Some(json!({
                    "sku": "X1",
                    "name": "Bad",
                    "price_cents": 100,
                    "min_order_quantity": 10,
                    "max_order_quantity": 5,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Anonymous writes
        let (status, _) = app
            .call(Method::POST, &uri, None, Some(json!({ "sku": "X1", "name": "A", "price_cents": 1 })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_and_soft_delete() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let id = app.create_product(&reg, "BOLT-M8", 1250, None).await;
        let uri = format!("/api/products/{id}");

        let (status, body) = app
            .call(Method::PATCH, &uri, Some(&reg.token), Some(json!({ "price_cents": 1400 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price_cents"], 1400);

        let (status, _) = app.call(Method::DELETE, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Hidden from the public, still visible to the manager
        let (status, _) = app.call(Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_active"], false);

        let list = format!("/api/organizations/{}/products", reg.organization_id);
        let (_, body) = app.call(Method::GET, &list, None, None).await;
        assert_eq!(body["total"], 0);
        let (_, body) = app
            .call(Method::GET, &format!("{list}?include_inactive=true"), Some(&reg.token), None)
            .await;
        assert_eq!(body["total"], 1);
    }
}
