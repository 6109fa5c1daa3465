//! Quotations: priced proposals that can be approved and turned into orders.
//!
//! ```text
//!   Draft ──send──► Sent ──approve──► Approved ──convert──► Converted (+ order)
//!     │               │
//!     └──reject───────┴──reject──► Rejected
//!                     └── approve after valid_until ──► Expired
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::dto::{
    CreateQuotationRequest, OrderResponse, QuotationListQuery, QuotationResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::routes::orders::push_new_order;
use crate::AppState;
use tradeflow_core::cart::check_order_quantity;
use tradeflow_core::numbering::quotation_number;
use tradeflow_core::validation::{validate_cart_size, validate_discount_bps};
use tradeflow_core::{
    CartOwner, CoreError, PricedLine, Quotation, QuotationItem, QuotationStatus, Totals,
    DEFAULT_QUOTATION_VALIDITY_DAYS,
};

async fn load_quotation(state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Quotation> {
    let quotation = state
        .db
        .quotations()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quotation", id))?;
    user.require_org(&quotation.organization_id)?;
    Ok(quotation)
}

async fn with_items(state: &AppState, quotation: Quotation) -> ApiResult<QuotationResponse> {
    let items = state.db.quotations().items(&quotation.id).await?;
    Ok(QuotationResponse::with_items(quotation, items))
}

/// Prices the requested lines, or the caller's active cart when none are given.
async fn quoted_lines(
    state: &AppState,
    user: &AuthUser,
    request: &CreateQuotationRequest,
) -> ApiResult<Vec<PricedLine>> {
    let products = state.db.products();
    let mut lines = Vec::new();

    match &request.items {
        Some(items) => {
            for item in items {
                validate_cart_size(lines.len())?;
                validate_discount_bps(item.discount_bps)?;
                let product = match products.get_by_id(&item.product_id).await? {
                    Some(p) if p.organization_id == user.organization_id => p,
                    _ => return Err(CoreError::ProductNotFound(item.product_id.clone()).into()),
                };
                check_order_quantity(&product, item.quantity)?;
                lines.push(PricedLine::from_product(&product, item.quantity).with_discount(item.discount_bps));
            }
        }
        None => {
            let owner = CartOwner::User(user.user_id.clone());
            let cart = state
                .db
                .carts()
                .find_active(&user.organization_id, &owner)
                .await?
                .ok_or(CoreError::EmptyCart)?;
            for item in state.db.carts().items(&cart.id).await? {
                if let Some(product) = products.get_by_id(&item.product_id).await? {
                    check_order_quantity(&product, item.quantity)?;
                    lines.push(
                        PricedLine::from_cart_item(&item, &product).with_discount(request.discount_bps),
                    );
                }
            }
        }
    }

    if lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }
    Ok(lines)
}

/// `POST /api/organizations/{org_id}/quotations`
pub async fn create_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<CreateQuotationRequest>,
) -> ApiResult<(StatusCode, Json<QuotationResponse>)> {
    user.require_org(&org_id)?;
    validate_discount_bps(request.discount_bps)?;

    match state.db.branches().get_by_id(&request.branch_id).await? {
        Some(branch) if branch.organization_id == org_id && branch.is_active => {}
        _ => return Err(ApiError::not_found("Branch", &request.branch_id)),
    }

    let now = Utc::now();
    let today = now.date_naive();
    let valid_until = match request.valid_until {
        Some(date) if date < today => {
            return Err(ApiError::validation("valid_until cannot be in the past"));
        }
        Some(date) => date,
        None => today
            .checked_add_signed(Duration::days(DEFAULT_QUOTATION_VALIDITY_DAYS))
            .ok_or_else(|| ApiError::internal("validity date out of range"))?,
    };

    let lines = quoted_lines(&state, &user, &request).await?;
    let totals = Totals::from_lines(&lines);

    let quotation = Quotation {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id,
        branch_id: request.branch_id.clone(),
        created_by: user.user_id.clone(),
        quotation_number: quotation_number(now),
        status: QuotationStatus::Draft,
        subtotal_cents: totals.subtotal.cents(),
        discount_cents: totals.discount.cents(),
        tax_cents: totals.tax.cents(),
        total_cents: totals.total.cents(),
        valid_until,
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        order_id: None,
        created_at: now,
        updated_at: now,
    };
    let items: Vec<QuotationItem> = lines
        .iter()
        .map(|line| QuotationItem {
            id: Uuid::new_v4().to_string(),
            quotation_id: quotation.id.clone(),
            product_id: line.product_id.clone(),
            sku_snapshot: line.sku.clone(),
            name_snapshot: line.name.clone(),
            unit_price_cents: line.unit_price.cents(),
            quantity: line.quantity,
            discount_bps: line.discount_bps,
            tax_rate_bps: line.tax_rate.bps(),
            line_total_cents: line.line_total().cents(),
        })
        .collect();

    state.db.quotations().create(&quotation, &items).await?;
    info!(
        quotation_id = %quotation.id,
        number = %quotation.quotation_number,
        lines = items.len(),
        "Quotation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(QuotationResponse::with_items(quotation, items)),
    ))
}

/// `GET /api/organizations/{org_id}/quotations?status=`
pub async fn list_quotations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<QuotationListQuery>,
) -> ApiResult<Json<Vec<QuotationResponse>>> {
    user.require_org(&org_id)?;
    let quotations = state.db.quotations().list(&org_id, query.status).await?;
    Ok(Json(quotations.into_iter().map(QuotationResponse::from).collect()))
}

/// `GET /api/quotations/{id}`
pub async fn get_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<QuotationResponse>> {
    let quotation = load_quotation(&state, &user, &id).await?;
    Ok(Json(with_items(&state, quotation).await?))
}

async fn move_to(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    next: QuotationStatus,
) -> ApiResult<QuotationResponse> {
    let quotation = load_quotation(state, user, id).await?;
    let next = quotation.status.transition(next)?;
    state.db.quotations().set_status(id, quotation.status, next).await?;

    let quotation = load_quotation(state, user, id).await?;
    with_items(state, quotation).await
}

/// `POST /api/quotations/{id}/send`
pub async fn send_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<QuotationResponse>> {
    Ok(Json(move_to(&state, &user, &id, QuotationStatus::Sent).await?))
}

/// `POST /api/quotations/{id}/approve`
///
/// A sent quotation past its `valid_until` is marked `Expired` instead and the
/// call fails.
pub async fn approve_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<QuotationResponse>> {
    let quotation = load_quotation(&state, &user, &id).await?;
    user.require_approver()?;

    if quotation.status == QuotationStatus::Sent && quotation.is_expired_on(Utc::now().date_naive()) {
        state
            .db
            .quotations()
            .set_status(&id, QuotationStatus::Sent, QuotationStatus::Expired)
            .await?;
        return Err(CoreError::QuotationExpired(quotation.quotation_number).into());
    }

    Ok(Json(move_to(&state, &user, &id, QuotationStatus::Approved).await?))
}

/// `POST /api/quotations/{id}/reject`
pub async fn reject_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<QuotationResponse>> {
    load_quotation(&state, &user, &id).await?;
    user.require_approver()?;
    Ok(Json(move_to(&state, &user, &id, QuotationStatus::Rejected).await?))
}

/// `POST /api/quotations/{id}/convert`
///
/// Creates the order at the quoted prices, then pushes it to Zoho like a
/// checkout does.
pub async fn convert_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    load_quotation(&state, &user, &id).await?;

    let (order, items) = state
        .db
        .orders()
        .create_from_quotation(&id, &user.user_id)
        .await?;
    let order = push_new_order(&state, order).await?;

    let invoice = state.db.invoices().get_by_order(&order.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::detailed(order, items, invoice)),
    ))
}
