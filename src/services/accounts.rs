//! Registration, login and profile lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::db::models::{NewUser, Role, User};
use crate::error::AppError;
use crate::media::{destroy_best_effort, Upload};
use crate::state::AppState;

/// Registration form. `adminAccessToken` elevates the account when it
/// matches the configured bootstrap secret.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub bio: Option<String>,
    pub admin_access_token: Option<String>,
}

/// Account as shown to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub role: Role,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for AccountView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            bio: user.bio,
            role: user.role,
            image: user.image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn role_for(supplied: Option<&str>, configured: Option<&str>) -> Role {
    match (supplied, configured) {
        (Some(supplied), Some(secret))
            if !secret.is_empty() && bool::from(supplied.as_bytes().ct_eq(secret.as_bytes())) =>
        {
            Role::Admin
        }
        _ => Role::Member,
    }
}

pub async fn register(
    state: &AppState,
    form: Registration,
    avatar: Option<Upload>,
) -> Result<AccountView, AppError> {
    let name = form.name.trim().to_string();
    let email = form.email.trim().to_string();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }

    if state.users.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already used".to_string()));
    }

    let password_hash = hash_password(&form.password).await?;
    let role = role_for(
        form.admin_access_token.as_deref(),
        state.config.admin_access_token.as_deref(),
    );

    let asset = match avatar {
        Some(upload) => Some(state.media.upload(upload).await?),
        None => None,
    };

    let new_user = NewUser {
        name,
        email,
        password_hash,
        bio: form.bio.filter(|b| !b.trim().is_empty()),
        role,
        image: asset.as_ref().map(|a| a.url.clone()),
        image_id: asset.as_ref().map(|a| a.asset_id.clone()),
    };

    match state.users.insert_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, role = %user.role, "user registered");
            Ok(user.into())
        }
        Err(e) => {
            if let Some(asset) = asset {
                destroy_best_effort(state.media.as_ref(), &asset.asset_id).await;
            }
            Err(e.into())
        }
    }
}

/// Returns a freshly issued session token.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .users
        .find_user_by_email(email)
        .await?
        .ok_or(AppError::NotRegistered)?;

    if !verify_password(password, &user.password_hash).await? {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials(
            "Password invalid, Use the correct password".to_string(),
        ));
    }

    let token = state
        .tokens
        .issue(user.id, &user.email, user.role == Role::Admin)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub async fn profile(state: &AppState, identity: &AuthUser) -> Result<AccountView, AppError> {
    state
        .users
        .find_user_by_id(identity.id)
        .await?
        .map(AccountView::from)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn list_accounts(state: &AppState) -> Result<Vec<AccountView>, AppError> {
    let users = state.users.list_users().await?;
    Ok(users.into_iter().map(AccountView::from).collect())
}
