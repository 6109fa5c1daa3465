//! Sales analytics over non-cancelled orders.
//!
//! `from` and `to` are calendar dates (UTC), both inclusive.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::auth::AuthUser;
use crate::dto::AnalyticsQuery;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use tradeflow_core::analytics::{
    self, CategoryBucket, Granularity, PeriodBucket, ProductSales, SalesRow, SalesSummary,
};

const DEFAULT_TOP_PRODUCTS: usize = 10;
const MAX_TOP_PRODUCTS: usize = 100;

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

async fn rows(
    state: &AppState,
    user: &AuthUser,
    org_id: &str,
    query: &AnalyticsQuery,
) -> ApiResult<Vec<SalesRow>> {
    user.require_org(org_id)?;

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation("from must not be after to"));
        }
    }
    let from = query.from.map(start_of);
    let to = match query.to {
        Some(to) => Some(start_of(
            to.checked_add_days(Days::new(1))
                .ok_or_else(|| ApiError::validation("to is out of range"))?,
        )),
        None => None,
    };

    Ok(state.db.orders().sales_rows(org_id, from, to).await?)
}

/// `GET /api/organizations/{org_id}/analytics/summary`
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<SalesSummary>> {
    let rows = rows(&state, &user, &org_id, &query).await?;
    Ok(Json(analytics::summary(&rows)))
}

/// `GET /api/organizations/{org_id}/analytics/sales?granularity=day|week|month`
pub async fn sales(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Vec<PeriodBucket>>> {
    let granularity = match query.granularity.as_deref() {
        Some(value) => value.parse::<Granularity>()?,
        None => Granularity::default(),
    };
    let rows = rows(&state, &user, &org_id, &query).await?;
    Ok(Json(analytics::sales_by_period(&rows, granularity)))
}

/// `GET /api/organizations/{org_id}/analytics/categories`
pub async fn categories(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Vec<CategoryBucket>>> {
    let rows = rows(&state, &user, &org_id, &query).await?;
    Ok(Json(analytics::sales_by_category(&rows)))
}

/// `GET /api/organizations/{org_id}/analytics/top-products?limit=`
pub async fn top_products(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Vec<ProductSales>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    let rows = rows(&state, &user, &org_id, &query).await?;
    Ok(Json(analytics::top_products(&rows, limit)))
}
