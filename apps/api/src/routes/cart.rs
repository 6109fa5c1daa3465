//! Shopping cart.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Owner        Organization comes from                                   │
//! │  ─────        ───────────────────────                                   │
//! │  User         the token (a different organization_id → 403)             │
//! │  Guest        organization_id in the query / body (required)            │
//! │                                                                         │
//! │  add ──► check_order_quantity(existing + added) ──► upsert line         │
//! │  checkout (users only) ──► order ──► Zoho sync attempt ──► 201          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::auth::CartActor;
use crate::dto::{
    AddCartItemRequest, CartQuery, CartResponse, CheckoutRequest, OrderResponse,
    SetQuantityRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::routes::orders::push_new_order;
use crate::AppState;
use tradeflow_core::cart::check_order_quantity;
use tradeflow_core::validation::validate_cart_size;
use tradeflow_core::{Cart, CoreError, PricedLine, Product};
use tradeflow_db::NewOrder;

/// Organization the cart lives in, checked against the actor.
async fn resolve_organization(
    state: &AppState,
    actor: &CartActor,
    requested: Option<&str>,
) -> ApiResult<String> {
    match actor {
        CartActor::User(user) => {
            if let Some(requested) = requested {
                user.require_org(requested)?;
            }
            Ok(user.organization_id.clone())
        }
        CartActor::Guest(_) => {
            let id = requested
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ApiError::validation("organization_id is required for guest carts"))?;
            match state.db.organizations().get_by_id(id).await? {
                Some(org) if org.is_active => Ok(org.id),
                _ => Err(ApiError::not_found("Organization", id)),
            }
        }
    }
}

/// Fails unless the branch is active and belongs to the organization.
async fn check_branch(state: &AppState, organization_id: &str, branch_id: &str) -> ApiResult<()> {
    match state.db.branches().get_by_id(branch_id).await? {
        Some(branch) if branch.organization_id == organization_id && branch.is_active => Ok(()),
        _ => Err(ApiError::not_found("Branch", branch_id)),
    }
}

async fn load_sellable_product(
    state: &AppState,
    organization_id: &str,
    product_id: &str,
) -> ApiResult<Product> {
    match state.db.products().get_by_id(product_id).await? {
        Some(product) if product.organization_id == organization_id => Ok(product),
        _ => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
    }
}

async fn active_cart(state: &AppState, organization_id: &str, actor: &CartActor) -> ApiResult<Cart> {
    state
        .db
        .carts()
        .find_active(organization_id, &actor.owner())
        .await?
        .ok_or_else(|| ApiError::not_found("Cart", organization_id))
}

/// Prices the cart's lines. The cart row is re-read so `updated_at` is current.
async fn cart_response(state: &AppState, cart_id: &str) -> ApiResult<CartResponse> {
    let cart = state
        .db
        .carts()
        .get_by_id(cart_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cart", cart_id))?;

    let items = state.db.carts().items(cart_id).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        if let Some(product) = state.db.products().get_by_id(&item.product_id).await? {
            lines.push(PricedLine::from_cart_item(item, &product));
        }
    }
    Ok(CartResponse::new(cart, &lines))
}

/// `GET /api/cart?organization_id=&branch_id=`
pub async fn get_cart(
    State(state): State<AppState>,
    actor: CartActor,
    Query(query): Query<CartQuery>,
) -> ApiResult<Json<CartResponse>> {
    let org = resolve_organization(&state, &actor, query.organization_id.as_deref()).await?;
    if let Some(branch) = &query.branch_id {
        check_branch(&state, &org, branch).await?;
    }

    let cart = state
        .db
        .carts()
        .get_or_create_active(&org, query.branch_id.as_deref(), &actor.owner())
        .await?;
    Ok(Json(cart_response(&state, &cart.id).await?))
}

/// `POST /api/cart/items`
///
/// Adding a product that is already in the cart increases its quantity; the
/// combined quantity must still satisfy the product's rules.
pub async fn add_item(
    State(state): State<AppState>,
    actor: CartActor,
    Json(request): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    if request.quantity <= 0 {
        return Err(ApiError::validation("quantity must be positive"));
    }
    let org = resolve_organization(&state, &actor, request.organization_id.as_deref()).await?;
    if let Some(branch) = &request.branch_id {
        check_branch(&state, &org, branch).await?;
    }
    let product = load_sellable_product(&state, &org, &request.product_id).await?;

    let cart = state
        .db
        .carts()
        .get_or_create_active(&org, request.branch_id.as_deref(), &actor.owner())
        .await?;

    let quantity = match state.db.carts().get_item(&cart.id, &product.id).await? {
        Some(existing) => existing.quantity.saturating_add(request.quantity),
        None => {
            let lines = state.db.carts().items(&cart.id).await?.len();
            validate_cart_size(lines)?;
            request.quantity
        }
    };
    check_order_quantity(&product, quantity)?;

    state.db.carts().upsert_item(&cart.id, &product, quantity).await?;
    Ok(Json(cart_response(&state, &cart.id).await?))
}

/// `PATCH /api/cart/items/{product_id}`. Zero removes the line.
pub async fn set_quantity(
    State(state): State<AppState>,
    actor: CartActor,
    Path(product_id): Path<String>,
    Json(request): Json<SetQuantityRequest>,
) -> ApiResult<Json<CartResponse>> {
    let org = resolve_organization(&state, &actor, request.organization_id.as_deref()).await?;
    let cart = active_cart(&state, &org, &actor).await?;

    if request.quantity < 0 {
        return Err(ApiError::validation("quantity cannot be negative"));
    }
    if request.quantity > 0 {
        let product = load_sellable_product(&state, &org, &product_id).await?;
        check_order_quantity(&product, request.quantity)?;
    }

    state
        .db
        .carts()
        .set_item_quantity(&cart.id, &product_id, request.quantity)
        .await?;
    Ok(Json(cart_response(&state, &cart.id).await?))
}

/// `DELETE /api/cart/items/{product_id}`
pub async fn remove_item(
    State(state): State<AppState>,
    actor: CartActor,
    Path(product_id): Path<String>,
    Query(query): Query<CartQuery>,
) -> ApiResult<Json<CartResponse>> {
    let org = resolve_organization(&state, &actor, query.organization_id.as_deref()).await?;
    let cart = active_cart(&state, &org, &actor).await?;

    state.db.carts().remove_item(&cart.id, &product_id).await?;
    Ok(Json(cart_response(&state, &cart.id).await?))
}

/// `DELETE /api/cart`
pub async fn clear_cart(
    State(state): State<AppState>,
    actor: CartActor,
    Query(query): Query<CartQuery>,
) -> ApiResult<Json<CartResponse>> {
    let org = resolve_organization(&state, &actor, query.organization_id.as_deref()).await?;
    let cart = active_cart(&state, &org, &actor).await?;

    let removed = state.db.carts().clear(&cart.id).await?;
    info!(cart_id = %cart.id, removed, "Cart cleared");
    Ok(Json(cart_response(&state, &cart.id).await?))
}

/// `POST /api/cart/checkout`
///
/// Signed-in users only. After the order commits, the order is pushed to Zoho
/// when the organization is connected; a failed push leaves the order in
/// place with `zoho_sync_status = "failed"` for a later retry.
pub async fn checkout(
    State(state): State<AppState>,
    actor: CartActor,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let user = actor
        .user()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Sign in to check out"))?;
    let org = resolve_organization(&state, &actor, request.organization_id.as_deref()).await?;
    let cart = active_cart(&state, &org, &actor).await?;

    let branch_id = request
        .branch_id
        .or_else(|| cart.branch_id.clone())
        .ok_or(CoreError::BranchRequired)?;
    check_branch(&state, &org, &branch_id).await?;

    let notes = request
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let new_order = NewOrder {
        organization_id: org.clone(),
        branch_id,
        user_id: user.user_id.clone(),
        notes,
    };
    let (order, items) = state.db.orders().create_from_cart(&cart.id, &new_order).await?;
    let order = push_new_order(&state, order).await?;

    let invoice = state.db.invoices().get_by_order(&order.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::detailed(order, items, invoice)),
    ))
}
