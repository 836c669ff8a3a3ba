//! bcrypt password hashing.
//!
//! bcrypt is CPU-bound; both calls run on the blocking pool so they do not
//! stall other in-flight requests.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Work factor for new hashes.
pub const PASSWORD_HASH_COST: u32 = 10;

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, PASSWORD_HASH_COST))
        .await
        .map_err(|e| AppError::Hashing(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Hashing(e.to_string()))
}

/// Fails only when `password_hash` is not a bcrypt hash.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Hashing(format!("verification task failed: {}", e)))?
        .map_err(|e| AppError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hashed = hash_password("correct horse").await.unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(hashed.contains("$10$"));
        assert!(verify_password("correct horse", &hashed).await.unwrap());
        assert!(!verify_password("battery staple", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_is_salted() {
        let a = hash_password("same").await.unwrap();
        let b = hash_password("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_hashing_error() {
        let result = verify_password("anything", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AppError::Hashing(_))));
    }
}
