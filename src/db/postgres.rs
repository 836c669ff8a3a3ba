//! PostgreSQL store built on a sqlx connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::models::{NewPost, NewUser, Post, PostChanges, PostStatus, User};
use super::{PostStore, StoreError, UserStore};
use crate::config::DbConfig;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, bio, role, image, image_id, created_at, updated_at";

const POST_COLUMNS: &str = "id, title, slug, content, author_id, tags, status, published_at, \
     excerpt, views, likes, cover_image, image_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    bio: Option<String>,
    role: String,
    image: Option<String>,
    image_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            bio: row.bio,
            role: row.role.parse().map_err(StoreError::Backend)?,
            image: row.image,
            image_id: row.image_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    slug: String,
    content: String,
    author_id: Uuid,
    tags: Vec<String>,
    status: String,
    published_at: Option<DateTime<Utc>>,
    excerpt: String,
    views: i64,
    likes: i64,
    cover_image: Option<String>,
    image_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            author_id: row.author_id,
            tags: row.tags,
            status: row.status.parse().map_err(StoreError::Backend)?,
            published_at: row.published_at,
            excerpt: row.excerpt,
            views: row.views,
            likes: row.likes,
            cover_image: row.cover_image,
            image_id: row.image_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn posts_from_rows(rows: Vec<PostRow>) -> Result<Vec<Post>, StoreError> {
    rows.into_iter().map(Post::try_from).collect()
}

/// Map a unique-index violation onto the field it protects.
fn map_unique(e: sqlx::Error, field: &'static str) -> StoreError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(field)
        }
        _ => StoreError::from(e),
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, verify the connection and run migrations.
    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        let pool = init_pool(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(3))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            bio TEXT,
            role TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('member', 'admin')),
            image TEXT,
            image_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            content TEXT NOT NULL,
            author_id UUID NOT NULL REFERENCES users(id),
            tags TEXT[] NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
            published_at TIMESTAMPTZ,
            excerpt TEXT NOT NULL,
            views BIGINT NOT NULL DEFAULT 0,
            likes BIGINT NOT NULL DEFAULT 0,
            cover_image TEXT,
            image_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_posts_status_created
            ON posts(status, created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_posts_author_created
            ON posts(author_id, created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_tags ON posts USING GIN(tags)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, bio, role, image, image_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.bio)
            .bind(user.role.as_str())
            .bind(&user.image)
            .bind(&user.image_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique(e, "email"))?;

        row.try_into()
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO posts (id, title, slug, content, author_id, tags, status, published_at,
                               excerpt, cover_image, image_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now(), now())
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.content)
            .bind(post.author_id)
            .bind(&post.tags)
            .bind(post.status.as_str())
            .bind(post.published_at)
            .bind(&post.excerpt)
            .bind(&post.cover_image)
            .bind(&post.image_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique(e, "slug"))?;

        row.try_into()
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let sql = format!("SELECT {} FROM posts WHERE slug = $1", POST_COLUMNS);
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn list_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM posts
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            POST_COLUMNS
        );

        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        posts_from_rows(rows)
    }

    async fn count_posts(&self, status: Option<PostStatus>) -> Result<i64, StoreError> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE ($1::TEXT IS NULL OR status = $1)")
                .bind(status.map(|s| s.as_str()))
                .fetch_one(&self.pool)
                .await?;

        Ok(total.0)
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let sql = format!(
            "SELECT {} FROM posts WHERE author_id = $1 ORDER BY created_at DESC",
            POST_COLUMNS
        );

        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?;

        posts_from_rows(rows)
    }

    async fn update_post(
        &self,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let sql = format!(
            r#"
            UPDATE posts
            SET title = $1, slug = $2, content = $3, tags = $4, status = $5, published_at = $6,
                excerpt = $7, cover_image = $8, image_id = $9, updated_at = now()
            WHERE id = $10
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        sqlx::query_as::<_, PostRow>(&sql)
            .bind(&changes.title)
            .bind(&changes.slug)
            .bind(&changes.content)
            .bind(&changes.tags)
            .bind(changes.status.as_str())
            .bind(changes.published_at)
            .bind(&changes.excerpt)
            .bind(&changes.cover_image)
            .bind(&changes.image_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique(e, "slug"))?
            .map(Post::try_from)
            .transpose()
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}
