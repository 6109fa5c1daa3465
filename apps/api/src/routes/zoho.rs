//! Zoho connection management and bulk sync jobs, per organization.

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use crate::auth::AuthUser;
use crate::dto::{SyncPendingQuery, ZohoConnectRequest, ZohoStatusDto};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::routes::organizations::load_organization;
use crate::AppState;
use tradeflow_zoho::{ImportReport, SyncReport, ZohoError};

const DEFAULT_SYNC_BATCH: i64 = 50;
const MAX_SYNC_BATCH: i64 = 200;

async fn current_status(state: &AppState, org_id: &str) -> ApiResult<ZohoStatusDto> {
    let organization = load_organization(state, org_id).await?;
    let connection = state.db.zoho_connections().get(org_id).await?;
    Ok(ZohoStatusDto::new(organization.zoho_organization_id, connection))
}

/// `GET /api/organizations/{org_id}/zoho`
pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> ApiResult<Json<ZohoStatusDto>> {
    user.require_org(&org_id)?;
    Ok(Json(current_status(&state, &org_id).await?))
}

/// `POST /api/organizations/{org_id}/zoho/connect`
///
/// Exchanges the authorization code from the consent redirect for tokens and
/// stores them. `zoho_organization_id`, when given, is saved first.
pub async fn connect(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<ZohoConnectRequest>,
) -> ApiResult<Json<ZohoStatusDto>> {
    user.require_org(&org_id)?;
    user.require_admin()?;

    if !state.zoho.config().is_configured() {
        return Err(ApiError::new(
            ErrorCode::BusinessLogic,
            "Zoho client credentials are not configured on this server",
        ));
    }
    let code = request.code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("code is required"));
    }
    load_organization(&state, &org_id).await?;

    if let Some(zoho_id) = request.zoho_organization_id.as_deref().map(str::trim) {
        if !zoho_id.is_empty() {
            state
                .db
                .organizations()
                .set_zoho_organization_id(&org_id, Some(zoho_id))
                .await?;
        }
    }

    state.zoho.connect(&org_id, code).await?;
    Ok(Json(current_status(&state, &org_id).await?))
}

/// `DELETE /api/organizations/{org_id}/zoho`
pub async fn disconnect(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> ApiResult<Json<ZohoStatusDto>> {
    user.require_org(&org_id)?;
    user.require_admin()?;

    let removed = state.zoho.disconnect(&org_id).await?;
    info!(organization_id = %org_id, removed, "Zoho disconnect requested");
    Ok(Json(current_status(&state, &org_id).await?))
}

/// `POST /api/organizations/{org_id}/zoho/import-products`
pub async fn import_products(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> ApiResult<Json<ImportReport>> {
    user.require_org(&org_id)?;
    user.require_catalog_manager()?;

    if !state.zoho.is_connected(&org_id).await? {
        return Err(ZohoError::NotConnected(org_id).into());
    }
    Ok(Json(state.order_sync().import_products(&org_id).await?))
}

/// `POST /api/organizations/{org_id}/zoho/sync-pending?limit=`
///
/// Retries every unsynced or failed order, oldest first. Individual failures
/// are counted in the report, not returned as errors.
pub async fn sync_pending(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<SyncPendingQuery>,
) -> ApiResult<Json<SyncReport>> {
    user.require_org(&org_id)?;
    user.require_catalog_manager()?;

    if !state.zoho.is_connected(&org_id).await? {
        return Err(ZohoError::NotConnected(org_id).into());
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SYNC_BATCH)
        .clamp(1, MAX_SYNC_BATCH);
    Ok(Json(state.order_sync().sync_pending(&org_id, limit).await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tradeflow_core::ZohoConnection;

    #[tokio::test]
    async fn test_status_and_disconnect() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let uri = format!("/api/organizations/{}/zoho", reg.organization_id);

        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);

        app.state
            .db
            .zoho_connections()
            .upsert(&ZohoConnection {
                organization_id: reg.organization_id.clone(),
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
                api_domain: Some("https://www.zohoapis.in".to_string()),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let (_, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["api_domain"], "https://www.zohoapis.in");
        assert!(body.get("access_token").is_none());

        let (status, body) = app.call(Method::DELETE, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
    }

    #[tokio::test]
    async fn test_connect_needs_server_credentials() {
        let app = test_app().await;
        let reg = app.register("acme").await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/organizations/{}/zoho/connect", reg.organization_id),
                Some(&reg.token),
                Some(json!({ "code": "1000.abc" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_LOGIC");
    }

    #[tokio::test]
    async fn test_jobs_need_connection() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let base = format!("/api/organizations/{}/zoho", reg.organization_id);

        for job in ["import-products", "sync-pending"] {
            let (status, _) = app
                .call(Method::POST, &format!("{base}/{job}"), Some(&reg.token), None)
                .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{job}");
        }
    }
}
