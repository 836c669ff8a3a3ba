//! Persistence seams for accounts and posts.
//!
//! Services only see the `UserStore` and `PostStore` traits. `PgStore` is the
//! production implementation; `MemoryStore` backs development runs without a
//! `DATABASE_URL` and the test suite.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use models::{NewPost, NewUser, Post, PostChanges, PostStatus, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the offending field.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate("email") => AppError::Conflict("Email already used".to_string()),
            StoreError::Duplicate("slug") => {
                AppError::Conflict("A post with this title already exists".to_string())
            }
            StoreError::Duplicate(field) => AppError::Conflict(format!("Duplicate {}", field)),
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Duplicate("email")` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Exact, case-sensitive match.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Fails with `StoreError::Duplicate("slug")` when the slug is taken.
    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError>;

    /// Newest-created first. `None` means every status.
    async fn list_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError>;

    async fn count_posts(&self, status: Option<PostStatus>) -> Result<i64, StoreError>;

    /// Newest-created first.
    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError>;

    /// Returns `None` when the post vanished in the meantime.
    async fn update_post(&self, id: Uuid, changes: PostChanges)
        -> Result<Option<Post>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Round-trip latency to the backend.
    async fn ping(&self) -> Result<std::time::Duration, StoreError>;
}
