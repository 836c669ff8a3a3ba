//! In-process store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. Unique
//! email/slug checks happen under the write lock, so they hold under
//! concurrent requests exactly like the database's unique indexes.

use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{NewPost, NewUser, Post, PostChanges, PostStatus, User};
use super::{PostStore, StoreError, UserStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    // Kept in insertion order; listings walk it backwards.
    posts: RwLock<Vec<Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.reverse();
    // Stable: equal timestamps keep newest-inserted first.
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            bio: user.bio,
            role: user.role,
            image: user.image,
            image_id: user.image_id,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.iter().rev().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut posts = self.posts.write().await;
        if posts.iter().any(|p| p.slug == post.slug) {
            return Err(StoreError::Duplicate("slug"));
        }

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: post.title,
            slug: post.slug,
            content: post.content,
            author_id: post.author_id,
            tags: post.tags,
            status: post.status,
            published_at: post.published_at,
            excerpt: post.excerpt,
            views: 0,
            likes: 0,
            cover_image: post.cover_image,
            image_id: post.image_id,
            created_at: now,
            updated_at: now,
        };
        posts.push(post.clone());
        Ok(post)
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn list_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().await;
        let matching: Vec<Post> = posts
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();

        Ok(newest_first(matching)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_posts(&self, status: Option<PostStatus>) -> Result<i64, StoreError> {
        let posts = self.posts.read().await;
        let count = posts
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .count();
        Ok(count as i64)
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().await;
        let matching: Vec<Post> = posts
            .iter()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn update_post(
        &self,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write().await;
        if posts.iter().any(|p| p.id != id && p.slug == changes.slug) {
            return Err(StoreError::Duplicate("slug"));
        }

        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        post.title = changes.title;
        post.slug = changes.slug;
        post.content = changes.content;
        post.tags = changes.tags;
        post.status = changes.status;
        post.published_at = changes.published_at;
        post.excerpt = changes.excerpt;
        post.cover_image = changes.cover_image;
        post.image_id = changes.image_id;
        post.updated_at = Utc::now();

        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() != before)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _ = self.posts.read().await.len();
        Ok(start.elapsed())
    }
}
