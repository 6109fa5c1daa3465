//! Orders and their invoices.
//!
//! Orders are created by checkout or quotation conversion; here they are read,
//! moved through their status lifecycle and pushed to Zoho on demand.

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::dto::{InvoiceDto, InvoiceListQuery, OrderListQuery, OrderResponse, OrderStatusRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use tradeflow_core::Order;
use tradeflow_db::OrderFilter;

const MAX_PAGE_SIZE: i64 = 200;

async fn load_order(state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Order> {
    let order = state
        .db
        .orders()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", id))?;
    user.require_org(&order.organization_id)?;
    Ok(order)
}

async fn detailed(state: &AppState, order: Order) -> ApiResult<OrderResponse> {
    let items = state.db.orders().items(&order.id).await?;
    let invoice = state.db.invoices().get_by_order(&order.id).await?;
    Ok(OrderResponse::detailed(order, items, invoice))
}

/// Best-effort push of a freshly created order.
///
/// Skipped when the organization has no Zoho connection. A failure is logged
/// and recorded on the order by the sync pipeline; the stored order is
/// returned either way.
pub(crate) async fn push_new_order(state: &AppState, order: Order) -> ApiResult<Order> {
    if !state.zoho.is_connected(&order.organization_id).await? {
        return Ok(order);
    }

    match state.order_sync().sync_order(&order.id).await {
        Ok(synced) => Ok(synced),
        Err(err) => {
            warn!(order_id = %order.id, error = %err, "Zoho sync of new order failed");
            Ok(state.db.orders().get_by_id(&order.id).await?.unwrap_or(order))
        }
    }
}

/// `GET /api/organizations/{org_id}/orders?status=&branch_id=&limit=&offset=`
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    user.require_org(&org_id)?;

    let mut filter = OrderFilter::new(&org_id);
    filter.branch_id = query.branch_id;
    filter.status = query.status;
    if let Some(limit) = query.limit {
        filter.limit = limit.clamp(1, MAX_PAGE_SIZE);
    }
    filter.offset = query.offset.unwrap_or(0).max(0);

    let orders = state.db.orders().list(&filter).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    let order = load_order(&state, &user, &id).await?;
    Ok(Json(detailed(&state, order).await?))
}

/// `POST /api/orders/{id}/status`
pub async fn change_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<OrderStatusRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let order = load_order(&state, &user, &id).await?;
    user.require_approver()?;

    let next = order.status.transition(request.status)?;
    state.db.orders().set_status(&id, order.status, next).await?;
    info!(order_id = %id, from = order.status.as_str(), to = next.as_str(), "Order status changed");

    let order = load_order(&state, &user, &id).await?;
    Ok(Json(detailed(&state, order).await?))
}

/// `POST /api/orders/{id}/zoho-sync`
///
/// Runs the pipeline synchronously and reports its error to the caller.
pub async fn sync_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    load_order(&state, &user, &id).await?;
    user.require_catalog_manager()?;

    let order = state.order_sync().sync_order(&id).await?;
    Ok(Json(detailed(&state, order).await?))
}

/// `GET /api/organizations/{org_id}/invoices?status=`
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult<Json<Vec<InvoiceDto>>> {
    user.require_org(&org_id)?;
    let invoices = state.db.invoices().list(&org_id, query.status).await?;
    Ok(Json(invoices.into_iter().map(InvoiceDto::from).collect()))
}

/// `GET /api/invoices/{id}`
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDto>> {
    let invoice = state
        .db
        .invoices()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice", &id))?;
    user.require_org(&invoice.organization_id)?;
    Ok(Json(InvoiceDto::from(invoice)))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{test_app, Registered, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    async fn place_order(app: &TestApp, reg: &Registered, product: &str, quantity: i64) -> Value {
        let branch = app.create_branch(reg, &format!("B{quantity}")).await;
        let (status, _) = app
            .call(
                Method::POST,
                "/api/cart/items",
                Some(&reg.token),
                Some(json!({ "product_id": product, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, order) = app
            .call(Method::POST, "/api/cart/checkout", Some(&reg.token), Some(json!({ "branch_id": branch })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let product = app.create_product(&reg, "BOLT-M8", 1000, None).await;
        let first = place_order(&app, &reg, &product, 1).await;
        place_order(&app, &reg, &product, 2).await;

        let uri = format!("/api/organizations/{}/orders", reg.organization_id);
        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let by_branch = format!("{uri}?branch_id={}", first["branch_id"].as_str().unwrap());
        let (_, body) = app.call(Method::GET, &by_branch, Some(&reg.token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = app.call(Method::GET, &format!("{uri}?status=shipped"), Some(&reg.token), None).await;
        assert!(body.as_array().unwrap().is_empty());

        let id = first["id"].as_str().unwrap();
        let (status, body) = app
            .call(Method::GET, &format!("/api/orders/{id}"), Some(&reg.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["sku"], "BOLT-M8");
        assert!(body.get("invoice").is_none());

        let other = app.register("globex").await;
        let (status, _) = app
            .call(Method::GET, &format!("/api/orders/{id}"), Some(&other.token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let product = app.create_product(&reg, "BOLT-M8", 1000, Some(10)).await;
        let order = place_order(&app, &reg, &product, 4).await;
        let uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());

        let (status, body) = app
            .call(Method::POST, &uri, Some(&reg.token), Some(json!({ "status": "confirmed" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");

        let (status, body) = app
            .call(Method::POST, &uri, Some(&reg.token), Some(json!({ "status": "delivered" })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_LOGIC");

        let (status, _) = app
            .call(Method::POST, &uri, Some(&reg.token), Some(json!({ "status": "cancelled" })))
            .await;
        assert_eq!(status, StatusCode::OK);

        // Cancelling put the stock back
        let (_, body) = app
            .call(Method::GET, &format!("/api/products/{product}"), None, None)
            .await;
        assert_eq!(body["stock_quantity"], 10);
    }

    #[tokio::test]
    async fn test_sync_without_zoho_records_failure() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let product = app.create_product(&reg, "BOLT-M8", 1000, None).await;
        let order = place_order(&app, &reg, &product, 1).await;
        let id = order["id"].as_str().unwrap();

        let (status, body) = app
            .call(Method::POST, &format!("/api/orders/{id}/zoho-sync"), Some(&reg.token), None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_LOGIC");

        let (_, body) = app
            .call(Method::GET, &format!("/api/orders/{id}"), Some(&reg.token), None)
            .await;
        assert_eq!(body["zoho_sync_status"], "failed");
        assert!(body["zoho_sync_error"].is_string());
    }

    #[tokio::test]
    async fn test_invoices_empty_and_missing() {
        let app = test_app().await;
        let reg = app.register("acme").await;

        let uri = format!("/api/organizations/{}/invoices", reg.organization_id);
        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());

        let (status, _) = app.call(Method::GET, "/api/invoices/nope", Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
