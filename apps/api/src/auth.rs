//! Authentication: password hashing, JWT issuance and request extractors.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/auth/login { email, password }                               │
//! │       │ argon2 verify                                                   │
//! │       ▼                                                                 │
//! │  JWT (HS256) { sub: user_id, org, role, iat, exp, jti }                 │
//! │                                                                         │
//! │  Authorization: Bearer <jwt>  ──► AuthUser                              │
//! │  X-Session-Id: <opaque>       ──► CartActor::Guest (carts only)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;
use tradeflow_core::{CartOwner, User, UserRole};

/// Header carrying a guest cart session.
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,

    /// Organization id
    pub org: String,

    pub role: UserRole,

    pub iat: i64,

    pub exp: i64,

    pub jti: String,
}

pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            org: user.organization_id.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.lifetime_secs)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Extractors
// =============================================================================

/// Authenticated caller. Rejects with 401 when the bearer token is missing or
/// invalid.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub organization_id: String,
    pub role: UserRole,
}

impl AuthUser {
    /// 403 unless the caller belongs to `organization_id`.
    pub fn require_org(&self, organization_id: &str) -> Result<(), ApiError> {
        if self.organization_id != organization_id {
            return Err(ApiError::forbidden("Not a member of this organization"));
        }
        Ok(())
    }

    pub fn require_catalog_manager(&self) -> Result<(), ApiError> {
        if !self.role.can_manage_catalog() {
            return Err(ApiError::forbidden("Catalog changes need the admin or manager role"));
        }
        Ok(())
    }

    pub fn require_approver(&self) -> Result<(), ApiError> {
        if !self.role.can_approve() {
            return Err(ApiError::forbidden("Approval needs the admin or manager role"));
        }
        Ok(())
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if !self.role.can_administer() {
            return Err(ApiError::forbidden("Admin role required"));
        }
        Ok(())
    }
}

fn bearer_claims(headers: &HeaderMap, jwt: &JwtManager) -> Option<Result<Claims, ApiError>> {
    let header = headers.get(AUTHORIZATION)?;
    let token = header.to_str().ok().and_then(extract_bearer_token);
    Some(match token {
        Some(token) => jwt.validate(token),
        None => Err(ApiError::unauthorized("Malformed Authorization header")),
    })
}

/// Caller of a public route, if a valid token was sent.
pub fn optional_user(headers: &HeaderMap, jwt: &JwtManager) -> Option<AuthUser> {
    bearer_claims(headers, jwt)?.ok().map(AuthUser::from)
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.sub,
            organization_id: claims.org,
            role: claims.role,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_claims(&parts.headers, &state.jwt) {
            Some(claims) => Ok(AuthUser::from(claims?)),
            None => Err(ApiError::unauthorized("Missing bearer token")),
        }
    }
}

/// Whoever owns the cart of this request: a signed-in user or a guest session.
#[derive(Debug, Clone)]
pub enum CartActor {
    User(AuthUser),
    Guest(String),
}

impl CartActor {
    pub fn owner(&self) -> CartOwner {
        match self {
            CartActor::User(user) => CartOwner::User(user.user_id.clone()),
            CartActor::Guest(session) => CartOwner::Guest(session.clone()),
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            CartActor::User(user) => Some(user),
            CartActor::Guest(_) => None,
        }
    }
}

impl FromRequestParts<AppState> for CartActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = bearer_claims(&parts.headers, &state.jwt) {
            return Ok(CartActor::User(AuthUser::from(claims?)));
        }

        let session = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= 128);

        match session {
            Some(session) => Ok(CartActor::Guest(session.to_string())),
            None => Err(ApiError::unauthorized("Bearer token or X-Session-Id required")),
        }
    }
}
