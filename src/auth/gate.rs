//! Request guards: `AuthUser` for any valid token, `AdminUser` for accounts
//! whose stored role is admin.

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use uuid::Uuid;

use super::token::TokenService;
use crate::db::models::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

/// Identity carried by a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

/// An `AuthUser` whose account was re-checked and is currently an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Extract the bearer token: the header must start with `Bearer` and the
/// token is the second space-separated segment.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("Bearer"))
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
}

pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<AuthUser, AppError> {
    let token =
        bearer_token(headers).ok_or_else(|| AppError::Unauthenticated("Unauthorized".to_string()))?;

    match tokens.verify(token) {
        Ok(claims) => Ok(AuthUser {
            id: claims.id,
            email: claims.email,
            is_admin: claims.is_admin,
        }),
        Err(AppError::InvalidToken(reason)) => {
            Err(AppError::Unauthenticated(format!("Token failed: {}", reason)))
        }
        Err(other) => Err(other),
    }
}

/// Look the account up again instead of trusting the token's admin flag,
/// so a demoted admin loses access before the token expires.
pub async fn require_admin(state: &AppState, identity: &AuthUser) -> Result<User, AppError> {
    let user = state.users.find_user_by_id(identity.id).await?;

    match user {
        Some(user) if user.role == Role::Admin => Ok(user),
        _ => {
            tracing::warn!(user_id = %identity.id, "admin access denied");
            Err(AppError::Forbidden(
                "You are not authorized to access this resource.".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.tokens)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = authenticate(&parts.headers, &state.tokens)?;
        require_admin(state, &identity).await.map(AdminUser)
    }
}
