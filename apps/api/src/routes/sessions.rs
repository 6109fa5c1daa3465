//! Sign-in.

use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use crate::auth::verify_password;
use crate::dto::{LoginRequest, LoginResponse, UserDto};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// `POST /api/auth/login`
///
/// Unknown email, wrong password and a deactivated account all answer with
/// the same 401. With `session_id`, the guest cart is merged into the user's.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let rejected = || ApiError::unauthorized("Invalid email or password");

    let user = state
        .db
        .users()
        .get_by_email(&request.email)
        .await?
        .ok_or_else(rejected)?;

    if !user.is_active || !verify_password(&request.password, &user.password_hash) {
        warn!(user_id = %user.id, "Rejected sign-in");
        return Err(rejected());
    }

    let cart_id = match request.session_id.as_deref().map(str::trim) {
        Some(session) if !session.is_empty() => state
            .db
            .carts()
            .merge_guest_into_user(&user.organization_id, session, &user.id)
            .await?
            .map(|cart| cart.id),
        _ => None,
    };

    let token = state.jwt.issue(&user)?;
    info!(user_id = %user.id, organization_id = %user.organization_id, "User signed in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt.lifetime_secs(),
        user: UserDto::from(user),
        cart_id,
    }))
}
