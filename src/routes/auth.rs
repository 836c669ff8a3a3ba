/**
 * Account Routes
 * Registration, login, profile and the admin user listing
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::form::FormData;
use crate::auth::{AdminUser, AuthUser};
use crate::error::AppError;
use crate::services::accounts::{self, AccountView, Registration};
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: AccountView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<AccountView>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/auth/register
/// JSON or multipart; an optional avatar is sent as the `image` file field.
pub async fn register(
    State(state): State<AppState>,
    mut form: FormData<Registration>,
) -> Result<impl IntoResponse, AppError> {
    let avatar = form.file("image");
    accounts::register(&state, form.fields, avatar).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message: "User register successfully".to_string(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    form: FormData<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = accounts::login(&state, &form.fields.email, &form.fields.password).await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            message: "Login Successful".to_string(),
            token,
        }),
    ))
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = accounts::profile(&state, &user).await?;

    Ok(Json(ProfileResponse {
        success: true,
        message: "Success".to_string(),
        user: account,
    }))
}

/// GET /api/auth/users
/// Admin only; the role is re-checked against the stored account.
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let users = accounts::list_accounts(&state).await?;
    tracing::debug!(admin_id = %admin.id, count = users.len(), "listed users");

    Ok(Json(UsersResponse {
        success: true,
        users,
    }))
}
