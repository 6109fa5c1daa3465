//! Organizations and their users.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/organizations          (public) org + first admin + token    │
//! │  GET  /api/organizations/{id}     member                                │
//! │  PATCH /api/organizations/{id}    admin                                 │
//! │  GET  /api/organizations/{id}/users   member                            │
//! │  POST /api/organizations/{id}/users   admin                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, AuthUser};
use crate::dto::{CreateUserRequest, RegisterOrganizationRequest, UpdateOrganizationRequest, UserDto};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use tradeflow_core::validation::{
    slugify, validate_currency_code, validate_email, validate_name, validate_password,
    validate_slug,
};
use tradeflow_core::{Organization, User, UserRole};
use tradeflow_db::DbError;

const DEFAULT_CURRENCY: &str = "INR";

pub(crate) async fn load_organization(state: &AppState, id: &str) -> ApiResult<Organization> {
    state
        .db
        .organizations()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization", id))
}

/// `POST /api/organizations`
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterOrganizationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    validate_name("name", &request.name, 200)?;
    validate_name("admin_name", &request.admin_name, 200)?;
    validate_email(&request.admin_email)?;
    validate_password(&request.admin_password)?;

    let slug = match request.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slugify(&request.name),
    };
    validate_slug(&slug)?;

    let currency_code = request
        .currency_code
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    validate_currency_code(&currency_code)?;

    let admin_email = request.admin_email.trim().to_lowercase();
    if state.db.users().get_by_email(&admin_email).await?.is_some() {
        return Err(DbError::duplicate("email", &admin_email).into());
    }

    let now = Utc::now();
    let organization = Organization {
        id: Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        slug,
        currency_code,
        zoho_organization_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.db.organizations().insert(&organization).await?;

    let admin = User {
        id: Uuid::new_v4().to_string(),
        organization_id: organization.id.clone(),
        email: admin_email,
        name: request.admin_name.trim().to_string(),
        role: UserRole::Admin,
        password_hash: hash_password(&request.admin_password)?,
        is_active: true,
        created_at: now,
    };
    state.db.users().insert(&admin).await?;

    let token = state.jwt.issue(&admin)?;
    info!(organization_id = %organization.id, slug = %organization.slug, "Organization registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "organization": organization,
            "user": UserDto::from(admin),
            "token": token,
        })),
    ))
}

/// `GET /api/organizations/{org_id}`
pub async fn get_organization(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Organization>> {
    user.require_org(&org_id)?;
    Ok(Json(load_organization(&state, &org_id).await?))
}

/// `PATCH /api/organizations/{org_id}`
pub async fn update_organization(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    user.require_org(&org_id)?;
    user.require_admin()?;

    let mut organization = load_organization(&state, &org_id).await?;
    if let Some(name) = request.name {
        validate_name("name", &name, 200)?;
        organization.name = name.trim().to_string();
    }
    if let Some(code) = request.currency_code {
        let code = code.trim().to_uppercase();
        validate_currency_code(&code)?;
        organization.currency_code = code;
    }
    state.db.organizations().update(&organization).await?;

    if let Some(zoho_id) = request.zoho_organization_id {
        let zoho_id = zoho_id.trim();
        let zoho_id = (!zoho_id.is_empty()).then_some(zoho_id);
        state
            .db
            .organizations()
            .set_zoho_organization_id(&org_id, zoho_id)
            .await?;
    }

    Ok(Json(load_organization(&state, &org_id).await?))
}

/// `GET /api/organizations/{org_id}/users`
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<UserDto>>> {
    user.require_org(&org_id)?;
    let users = state.db.users().list_by_organization(&org_id).await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

/// `POST /api/organizations/{org_id}/users`
pub async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(org_id): Path<String>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserDto>)> {
    caller.require_org(&org_id)?;
    caller.require_admin()?;

    validate_email(&request.email)?;
    validate_name("name", &request.name, 200)?;
    validate_password(&request.password)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id,
        email: request.email.trim().to_lowercase(),
        name: request.name.trim().to_string(),
        role: request.role,
        password_hash: hash_password(&request.password)?,
        is_active: true,
        created_at: Utc::now(),
    };
    state.db.users().insert(&user).await?;
    info!(user_id = %user.id, role = user.role.as_str(), "User created");

    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_read() {
        let app = test_app().await;
        let reg = app.register("acme").await;

        let uri = format!("/api/organizations/{}", reg.organization_id);
        let (status, body) = app.call(Method::GET, &uri, Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "acme");
        assert_eq!(body["currency_code"], "INR");

        // No token
        let (status, _) = app.call(Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let app = test_app().await;
        app.register("acme").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/organizations",
                None,
                Some(json!({
                    "name": "Acme Two",
                    "slug": "acme",
                    "admin_name": "Bo",
                    "admin_email": "bo@acme2.in",
                    "admin_password": "another-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_other_organization_is_forbidden() {
        let app = test_app().await;
        let acme = app.register("acme").await;
        let other = app.register("globex").await;

        let uri = format!("/api/organizations/{}", acme.organization_id);
        let (status, _) = app.call(Method::GET, &uri, Some(&other.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_and_users() {
        let app = test_app().await;
        let reg = app.register("acme").await;
        let uri = format!("/api/organizations/{}", reg.organization_id);

        let (status, body) = app
            .call(
                Method::PATCH,
                &uri,
                Some(&reg.token),
                Some(json!({ "name": "Acme Industrial", "zoho_organization_id": "60001" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Acme Industrial");
        assert_eq!(body["zoho_organization_id"], "60001");

        let (status, body) = app
            .call(
                Method::POST,
                &format!("{uri}/users"),
                Some(&reg.token),
                Some(json!({
                    "email": "buyer@acme.in",
                    "name": "Ravi",
                    "password": "buyer-pass",
                    "role": "buyer",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "buyer");

        let (status, body) = app.call(Method::GET, &format!("{uri}/users"), Some(&reg.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        // Buyers cannot add users
        let (_, login) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "buyer@acme.in", "password": "buyer-pass" })),
            )
            .await;
        let buyer_token = login["token"].as_str().unwrap();
        let (status, _) = app
            .call(
                Method::POST,
                &format!("{uri}/users"),
                Some(buyer_token),
                Some(json!({
                    "email": "x@acme.in",
                    "name": "X",
                    "password": "xxxxxxxx",
                    "role": "admin",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
