//! Branches: the organization's locations, each mirrored as one Zoho contact.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::dto::{BranchListQuery, CreateBranchRequest, UpdateBranchRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use tradeflow_core::validation::{validate_email, validate_name};
use tradeflow_core::Branch;

const MAX_CODE_LEN: usize = 20;

/// Loads a branch and checks the caller's organization.
pub(crate) async fn load_branch(state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Branch> {
    let branch = state
        .db
        .branches()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Branch", id))?;
    user.require_org(&branch.organization_id)?;
    Ok(branch)
}

fn normalize_code(code: &str) -> ApiResult<String> {
    validate_name("code", code, MAX_CODE_LEN)?;
    let code = code.trim().to_uppercase();
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ApiError::validation(
            "code may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(code)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `POST /api/organizations/{org_id}/branches`
pub async fn create_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<CreateBranchRequest>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    user.require_org(&org_id)?;
    user.require_catalog_manager()?;

    validate_name("name", &request.name, 200)?;
    let code = normalize_code(&request.code)?;
    let email = clean(request.email);
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let now = Utc::now();
    let branch = Branch {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id,
        name: request.name.trim().to_string(),
        code,
        contact_name: clean(request.contact_name),
        email,
        phone: clean(request.phone),
        address_line: clean(request.address_line),
        city: clean(request.city),
        state: clean(request.state),
        postal_code: clean(request.postal_code),
        country: clean(request.country),
        tax_number: clean(request.tax_number),
        zoho_contact_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.db.branches().insert(&branch).await?;
    info!(branch_id = %branch.id, code = %branch.code, "Branch created");

    Ok((StatusCode::CREATED, Json(branch)))
}

/// `GET /api/organizations/{org_id}/branches`
pub async fn list_branches(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Query(query): Query<BranchListQuery>,
) -> ApiResult<Json<Vec<Branch>>> {
    user.require_org(&org_id)?;
    let branches = state
        .db
        .branches()
        .list_by_organization(&org_id, query.include_inactive)
        .await?;
    Ok(Json(branches))
}

/// `GET /api/branches/{id}`
pub async fn get_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Branch>> {
    Ok(Json(load_branch(&state, &user, &id).await?))
}

/// `PATCH /api/branches/{id}`
pub async fn update_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateBranchRequest>,
) -> ApiResult<Json<Branch>> {
    let mut branch = load_branch(&state, &user, &id).await?;
    user.require_catalog_manager()?;

    if let Some(name) = request.name {
        validate_name("name", &name, 200)?;
        branch.name = name.trim().to_string();
    }
    if let Some(email) = request.email {
        let email = clean(Some(email));
        if let Some(email) = &email {
            validate_email(email)?;
        }
        branch.email = email;
    }
    if request.contact_name.is_some() {
        branch.contact_name = clean(request.contact_name);
    }
    if request.phone.is_some() {
        branch.phone = clean(request.phone);
    }
    if request.address_line.is_some() {
        branch.address_line = clean(request.address_line);
    }
    if request.city.is_some() {
        branch.city = clean(request.city);
    }
    if request.state.is_some() {
        branch.state = clean(request.state);
    }
    if request.postal_code.is_some() {
        branch.postal_code = clean(request.postal_code);
    }
    if request.country.is_some() {
        branch.country = clean(request.country);
    }
    if request.tax_number.is_some() {
        branch.tax_number = clean(request.tax_number);
    }

    state.db.branches().update(&branch).await?;
    Ok(Json(load_branch(&state, &user, &id).await?))
}

/// `DELETE /api/branches/{id}`
pub async fn deactivate_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    load_branch(&state, &user, &id).await?;
    user.require_catalog_manager()?;
    state.db.branches().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/branches/{id}/zoho-sync`
pub async fn sync_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    load_branch(&state, &user, &id).await?;
    user.require_catalog_manager()?;

    let contact_id = state.order_sync().sync_branch_contact(&id).await?;
    Ok(Json(json!({ "branch_id": id, "zoho_contact_id": contact_id })))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_branch_crud() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let id = app.create_branch(&reg, "main").await;

        let uri = format!("/api/branches/{id}");
        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "MAIN");

        let (status, body) = app
            .call(
                Method::PATCH,
                &uri,
                Some(&reg.token),
                Some(json!({ "city": "Pune", "email": "main@acme.in" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["city"], "Pune");
        assert_eq!(body["name"], "Branch main");

        let (status, _) = app.call(Method::DELETE, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let list_uri = format!("/api/organizations/{}/branches", reg.organization_id);
        let (_, body) = app.call(Method::GET, &list_uri, Some(&reg.token), None).await;
        assert!(body.as_array().unwrap().is_empty());
        let (_, body) = app
            .call(Method::GET, &format!("{list_uri}?include_inactive=true"), Some(&reg.token), None)
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_and_bad_input() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        app.create_branch(&reg, "MAIN").await;

        let uri = format!("/api/organizations/{}/branches", reg.organization_id);
        let (status, _) = app
            .call(Method::POST, &uri, Some(&reg.token), Some(json!({ "name": "Again", "code": "main" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .call(Method::POST, &uri, Some(&reg.token), Some(json!({ "name": "", "code": "X" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_zoho_sync_without_zoho_organization() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let id = app.create_branch(&reg, "MAIN").await;

        let (status, body) = app
            .call(Method::POST, &format!("/api/branches/{id}/zoho-sync"), Some(&reg.token), None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_LOGIC");
    }
}
