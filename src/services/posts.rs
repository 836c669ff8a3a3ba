//! Blog post lifecycle: slugs, publishing, ownership and cover images.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::models::{NewPost, Post, PostChanges, PostStatus, User};
use crate::error::AppError;
use crate::media::{destroy_best_effort, StoredAsset, Upload};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

lazy_static::lazy_static! {
    /// Lowercase letters and digits in hyphen-separated runs
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Lowercase the title and collapse every run of characters outside
/// `[a-z0-9]` into a single hyphen, without leading or trailing hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Accepts a JSON array of tags or a single comma-separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    let tags = match Option::<Tags>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Tags::List(list)) => list,
        Some(Tags::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(Some(
        tags.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    ))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub excerpt: String,
    pub status: Option<PostStatus>,
}

/// Partial update: absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Option<Vec<String>>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
}

/// Query string of the listing endpoint. Numbers stay strings so that
/// garbage falls back to the defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl From<User> for AuthorSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            image: user.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    /// `None` when the author account no longer exists.
    pub author: Option<AuthorSummary>,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: String,
    pub views: i64,
    pub likes: i64,
    pub cover_image: Option<String>,
    pub image_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostView {
    fn new(post: Post, author: Option<AuthorSummary>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            author,
            tags: post.tags,
            status: post.status,
            published_at: post.published_at,
            excerpt: post.excerpt,
            views: post.views,
            likes: post.likes,
            cover_image: post.cover_image,
            image_id: post.image_id,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub all: i64,
    pub drafts: i64,
    pub published: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub page: i64,
    pub total_pages: i64,
    pub total_posts: i64,
    pub count: StatusCounts,
}

/// Resolve the author of each post with one lookup per distinct author.
async fn with_authors(state: &AppState, posts: Vec<Post>) -> Result<Vec<PostView>, AppError> {
    let mut authors: HashMap<Uuid, Option<AuthorSummary>> = HashMap::new();
    for post in &posts {
        if !authors.contains_key(&post.author_id) {
            let author = state
                .users
                .find_user_by_id(post.author_id)
                .await?
                .map(AuthorSummary::from);
            authors.insert(post.author_id, author);
        }
    }

    Ok(posts
        .into_iter()
        .map(|post| {
            let author = authors.get(&post.author_id).cloned().flatten();
            PostView::new(post, author)
        })
        .collect())
}

async fn view(state: &AppState, post: Post) -> Result<PostView, AppError> {
    let mut views = with_authors(state, vec![post]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Storage("post vanished while loading author".to_string()))
}

fn post_not_found() -> AppError {
    AppError::NotFound("Blog post not found".to_string())
}

fn require_text(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn slug_for(title: &str) -> Result<String, AppError> {
    let slug = slugify(title);
    if !is_valid_slug(&slug) {
        return Err(AppError::Validation(
            "Title must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

fn can_modify(identity: &AuthUser, post: &Post) -> bool {
    identity.is_admin || identity.id == post.author_id
}

/// Load a post by id and check that `identity` may change it. Malformed ids
/// are reported as missing posts.
async fn load_for_mutation(
    state: &AppState,
    identity: &AuthUser,
    post_id: &str,
    action: &str,
) -> Result<Post, AppError> {
    let id = Uuid::parse_str(post_id).map_err(|_| post_not_found())?;
    let post = state
        .posts
        .find_post_by_id(id)
        .await?
        .ok_or_else(post_not_found)?;

    if !can_modify(identity, &post) {
        tracing::warn!(user_id = %identity.id, post_id = %post.id, action, "post access denied");
        return Err(AppError::Forbidden(format!(
            "You are not authorized to {} this blog post",
            action
        )));
    }

    Ok(post)
}

async fn upload_cover(state: &AppState, cover: Option<Upload>) -> Result<Option<StoredAsset>, AppError> {
    match cover {
        Some(upload) => Ok(Some(state.media.upload(upload).await?)),
        None => Ok(None),
    }
}

pub async fn create(
    state: &AppState,
    identity: &AuthUser,
    input: NewPostInput,
    cover: Option<Upload>,
) -> Result<PostView, AppError> {
    let title = require_text(&input.title, "Title")?;
    let content = require_text(&input.content, "Content")?;
    let excerpt = require_text(&input.excerpt, "Excerpt")?;
    let slug = slug_for(&title)?;
    let status = input.status.unwrap_or_default();

    let asset = upload_cover(state, cover).await?;

    let new_post = NewPost {
        title,
        slug,
        content,
        author_id: identity.id,
        tags: input.tags.unwrap_or_default(),
        status,
        published_at: (status == PostStatus::Published).then(Utc::now),
        excerpt,
        cover_image: asset.as_ref().map(|a| a.url.clone()),
        image_id: asset.as_ref().map(|a| a.asset_id.clone()),
    };

    let post = match state.posts.insert_post(new_post).await {
        Ok(post) => post,
        Err(e) => {
            if let Some(asset) = &asset {
                destroy_best_effort(state.media.as_ref(), &asset.asset_id).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(post_id = %post.id, slug = %post.slug, author_id = %post.author_id, status = %post.status, "post created");
    view(state, post).await
}

fn page_params(query: &ListQuery) -> (i64, i64) {
    let page = query
        .page
        .as_deref()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|l| *l >= 1)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

/// `None` means no status predicate.
fn status_filter(raw: Option<&str>) -> Result<Option<PostStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Some(PostStatus::Published)),
        Some("all") => Ok(None),
        Some(other) => other
            .parse::<PostStatus>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Unknown status filter {:?}", other))),
    }
}

pub async fn list(state: &AppState, query: ListQuery) -> Result<PostPage, AppError> {
    let filter = status_filter(query.status.as_deref())?;
    let (page, limit) = page_params(&query);
    let offset = (page - 1).saturating_mul(limit);

    let posts = state.posts.list_posts(filter, limit, offset).await?;
    let total_posts = state.posts.count_posts(filter).await?;
    let count = StatusCounts {
        all: state.posts.count_posts(None).await?,
        drafts: state.posts.count_posts(Some(PostStatus::Draft)).await?,
        published: state.posts.count_posts(Some(PostStatus::Published)).await?,
    };

    Ok(PostPage {
        posts: with_authors(state, posts).await?,
        page,
        total_pages: (total_posts + limit - 1) / limit,
        total_posts,
        count,
    })
}

pub async fn get_by_slug(state: &AppState, slug: &str) -> Result<PostView, AppError> {
    if !is_valid_slug(slug) {
        return Err(post_not_found());
    }
    let post = state
        .posts
        .find_post_by_slug(slug)
        .await?
        .ok_or_else(post_not_found)?;
    view(state, post).await
}

/// An author with no posts (or an id that names nobody) is reported as not
/// found, which is what existing clients expect.
pub async fn get_by_author(state: &AppState, author_id: &str) -> Result<Vec<PostView>, AppError> {
    let not_found = || AppError::NotFound("No blog posts found for this author".to_string());

    let author_id = Uuid::parse_str(author_id).map_err(|_| not_found())?;
    let posts = state.posts.list_posts_by_author(author_id).await?;
    if posts.is_empty() {
        return Err(not_found());
    }

    with_authors(state, posts).await
}

/// Apply a partial update. A new cover is uploaded before the record is
/// written and the previous asset is destroyed only after the write
/// succeeded, so the post never points at a missing image.
pub async fn update(
    state: &AppState,
    identity: &AuthUser,
    post_id: &str,
    patch: PostPatch,
    cover: Option<Upload>,
) -> Result<PostView, AppError> {
    let existing = load_for_mutation(state, identity, post_id, "update").await?;
    let mut changes = PostChanges::from(&existing);

    if let Some(title) = patch.title {
        changes.title = require_text(&title, "Title")?;
        changes.slug = slug_for(&changes.title)?;
    }
    if let Some(content) = patch.content {
        changes.content = require_text(&content, "Content")?;
    }
    if let Some(excerpt) = patch.excerpt {
        changes.excerpt = require_text(&excerpt, "Excerpt")?;
    }
    if let Some(tags) = patch.tags {
        changes.tags = tags;
    }
    if let Some(status) = patch.status {
        changes.status = status;
        if status == PostStatus::Published && existing.published_at.is_none() {
            changes.published_at = Some(Utc::now());
        }
    }

    let asset = upload_cover(state, cover).await?;
    if let Some(asset) = &asset {
        changes.cover_image = Some(asset.url.clone());
        changes.image_id = Some(asset.asset_id.clone());
    }

    let updated = match state.posts.update_post(existing.id, changes).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            if let Some(asset) = &asset {
                destroy_best_effort(state.media.as_ref(), &asset.asset_id).await;
            }
            return Err(post_not_found());
        }
        Err(e) => {
            if let Some(asset) = &asset {
                destroy_best_effort(state.media.as_ref(), &asset.asset_id).await;
            }
            return Err(e.into());
        }
    };

    if asset.is_some() {
        if let Some(old_id) = existing.image_id.as_deref() {
            destroy_best_effort(state.media.as_ref(), old_id).await;
        }
    }

    tracing::info!(post_id = %updated.id, slug = %updated.slug, status = %updated.status, "post updated");
    view(state, updated).await
}

/// Authorization is decided on the pre-fetched post before anything is
/// touched. The cover asset goes first, then the record.
pub async fn delete(state: &AppState, identity: &AuthUser, post_id: &str) -> Result<(), AppError> {
    let post = load_for_mutation(state, identity, post_id, "delete").await?;

    if let Some(asset_id) = post.image_id.as_deref() {
        state.media.destroy(asset_id).await?;
    }

    if !state.posts.delete_post(post.id).await? {
        return Err(post_not_found());
    }

    tracing::info!(post_id = %post.id, user_id = %identity.id, "post deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::local::tests::png_upload;
    use crate::services::accounts::{self, Registration};
    use crate::state::testing::{test_app, TestApp, ADMIN_SECRET};

    async fn account(app: &TestApp, email: &str, admin: bool) -> AuthUser {
        let view = accounts::register(
            &app.state,
            Registration {
                name: email.split('@').next().unwrap_or("user").to_string(),
                email: email.to_string(),
                password: "password1".to_string(),
                bio: None,
                admin_access_token: admin.then(|| ADMIN_SECRET.to_string()),
            },
            None,
        )
        .await
        .unwrap();

        AuthUser {
            id: view.id,
            email: view.email,
            is_admin: admin,
        }
    }

    fn input(title: &str, status: Option<PostStatus>) -> NewPostInput {
        NewPostInput {
            title: title.to_string(),
            content: "Some content".to_string(),
            tags: Some(vec!["rust".to_string()]),
            excerpt: "Short".to_string(),
            status,
        }
    }

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  --Rust  2024: what's new?--  "), "rust-2024-what-s-new");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Ünïcode Títle"), "n-code-t-tle");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_properties() {
        let titles = [
            "Hello World",
            "  leading and trailing  ",
            "multiple   spaces---and___underscores",
            "MiXeD CaSe 123",
            "--a--",
            "emoji 🚀 launch",
            "tabs\tand\nnewlines",
            "",
        ];
        for title in titles {
            let slug = slugify(title);
            assert_eq!(slugify(&slug), slug, "not idempotent for {:?}", title);
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
            assert!(slug.is_empty() || is_valid_slug(&slug));
        }
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_tags_accept_list_or_comma_string() {
        let from_list: NewPostInput =
            serde_json::from_str(r#"{"tags": ["a", " b ", ""]}"#).unwrap();
        assert_eq!(from_list.tags.unwrap(), vec!["a", "b"]);

        let from_string: NewPostInput = serde_json::from_str(r#"{"tags": "a, b,c"}"#).unwrap();
        assert_eq!(from_string.tags.unwrap(), vec!["a", "b", "c"]);

        let absent: PostPatch = serde_json::from_str("{}").unwrap();
        assert!(absent.tags.is_none());
    }

    #[test]
    fn test_page_params_fall_back_to_defaults() {
        let query = ListQuery {
            status: None,
            page: Some("abc".to_string()),
            limit: Some("-3".to_string()),
        };
        assert_eq!(page_params(&query), (1, DEFAULT_PAGE_SIZE));

        let query = ListQuery {
            status: None,
            page: Some("3".to_string()),
            limit: Some("1000".to_string()),
        };
        assert_eq!(page_params(&query), (3, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(status_filter(None).unwrap(), Some(PostStatus::Published));
        assert_eq!(status_filter(Some("all")).unwrap(), None);
        assert_eq!(status_filter(Some("draft")).unwrap(), Some(PostStatus::Draft));
        assert!(status_filter(Some("archived")).is_err());
    }

    #[tokio::test]
    async fn test_create_sets_author_slug_and_defaults() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;

        let post = create(&app.state, &ada, input("Hello, World!", None), None)
            .await
            .unwrap();

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.published_at.is_none());
        assert_eq!(post.author.unwrap().id, ada.id);
        assert_eq!(post.views, 0);
    }

    #[tokio::test]
    async fn test_create_published_stamps_published_at() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let post = create(
            &app.state,
            &ada,
            input("Live", Some(PostStatus::Published)),
            None,
        )
        .await
        .unwrap();
        assert!(post.published_at.is_some());
    }

    #[tokio::test]
    async fn test_create_validates_required_fields() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;

        let mut missing = input("Title", None);
        missing.excerpt = "  ".to_string();
        assert!(matches!(
            create(&app.state, &ada, missing, None).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            create(&app.state, &ada, input("???", None), None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_title_is_conflict_and_cover_is_released() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        create(&app.state, &ada, input("Same Title", None), None)
            .await
            .unwrap();

        let err = create(
            &app.state,
            &ada,
            input("same title", None),
            Some(png_upload()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The compensating destroy left no file behind.
        let mut entries = tokio::fs::read_dir(app.media.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_publish_is_stamped_once() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let post = create(&app.state, &ada, input("Draft", None), None)
            .await
            .unwrap();
        let id = post.id.to_string();

        let publish = PostPatch {
            status: Some(PostStatus::Published),
            ..PostPatch::default()
        };
        let published = update(&app.state, &ada, &id, publish.clone(), None)
            .await
            .unwrap();
        let first = published.published_at.unwrap();

        let again = update(&app.state, &ada, &id, publish, None).await.unwrap();
        assert_eq!(again.published_at, Some(first));

        let unpublish = PostPatch {
            status: Some(PostStatus::Draft),
            ..PostPatch::default()
        };
        let draft = update(&app.state, &ada, &id, unpublish, None).await.unwrap();
        assert_eq!(draft.status, PostStatus::Draft);
        assert_eq!(draft.published_at, Some(first));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_recomputes_slug() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let post = create(&app.state, &ada, input("Old Title", None), None)
            .await
            .unwrap();

        let patch = PostPatch {
            title: Some("New Title".to_string()),
            ..PostPatch::default()
        };
        let updated = update(&app.state, &ada, &post.id.to_string(), patch, None)
            .await
            .unwrap();

        assert_eq!(updated.slug, "new-title");
        assert_eq!(updated.content, post.content);
        assert_eq!(updated.tags, post.tags);
        assert_eq!(updated.author.unwrap().id, ada.id);
        assert!(get_by_slug(&app.state, "old-title").await.is_err());
    }

    #[tokio::test]
    async fn test_non_author_cannot_update_or_delete() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let bob = account(&app, "bob@example.com", false).await;
        let post = create(&app.state, &ada, input("Mine", None), None)
            .await
            .unwrap();
        let id = post.id.to_string();

        let patch = PostPatch {
            title: Some("Stolen".to_string()),
            ..PostPatch::default()
        };
        assert!(matches!(
            update(&app.state, &bob, &id, patch, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            delete(&app.state, &bob, &id).await,
            Err(AppError::Forbidden(_))
        ));

        let unchanged = get_by_slug(&app.state, "mine").await.unwrap();
        assert_eq!(unchanged.title, "Mine");
        assert_eq!(unchanged.updated_at, post.updated_at);
    }

    #[tokio::test]
    async fn test_admin_can_update_and_delete_any_post() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let root = account(&app, "root@example.com", true).await;
        let post = create(&app.state, &ada, input("Moderated", None), None)
            .await
            .unwrap();
        let id = post.id.to_string();

        let patch = PostPatch {
            excerpt: Some("Edited by admin".to_string()),
            ..PostPatch::default()
        };
        let edited = update(&app.state, &root, &id, patch, None).await.unwrap();
        assert_eq!(edited.excerpt, "Edited by admin");
        assert_eq!(edited.author.unwrap().id, ada.id);

        delete(&app.state, &root, &id).await.unwrap();
        assert!(matches!(
            get_by_slug(&app.state, "moderated").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cover_swap_keeps_new_and_destroys_old() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let post = create(&app.state, &ada, input("Covered", None), Some(png_upload()))
            .await
            .unwrap();
        let old_id = post.image_id.clone().unwrap();
        assert!(app.media.path_of(&old_id).unwrap().exists());

        // No new image: existing cover is retained.
        let patch = PostPatch {
            content: Some("Updated".to_string()),
            ..PostPatch::default()
        };
        let kept = update(&app.state, &ada, &post.id.to_string(), patch, None)
            .await
            .unwrap();
        assert_eq!(kept.image_id.as_deref(), Some(old_id.as_str()));

        let swapped = update(
            &app.state,
            &ada,
            &post.id.to_string(),
            PostPatch::default(),
            Some(png_upload()),
        )
        .await
        .unwrap();
        let new_id = swapped.image_id.unwrap();
        assert_ne!(new_id, old_id);
        assert!(app.media.path_of(&new_id).unwrap().exists());
        assert!(!app.media.path_of(&old_id).unwrap().exists());
    }

    #[tokio::test]
    async fn test_delete_releases_cover() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let post = create(&app.state, &ada, input("Bye", None), Some(png_upload()))
            .await
            .unwrap();
        let path = app.media.path_of(post.image_id.as_deref().unwrap()).unwrap();

        delete(&app.state, &ada, &post.id.to_string()).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            delete(&app.state, &ada, &post.id.to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        assert!(matches!(
            delete(&app.state, &ada, "not-a-uuid").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_counts_are_global() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        for (title, status) in [
            ("One", PostStatus::Draft),
            ("Two", PostStatus::Published),
            ("Three", PostStatus::Published),
        ] {
            create(&app.state, &ada, input(title, Some(status)), None)
                .await
                .unwrap();
        }

        let default = list(&app.state, ListQuery::default()).await.unwrap();
        assert_eq!(default.total_posts, 2);
        assert!(default.posts.iter().all(|p| p.status == PostStatus::Published));

        let all = list(
            &app.state,
            ListQuery {
                status: Some("all".to_string()),
                ..ListQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(all.posts.len(), 3);
        assert_eq!(all.posts[0].title, "Three");
        assert_eq!(all.count, default.count);
        assert_eq!(all.count.all, all.count.drafts + all.count.published);
        assert_eq!(all.count, StatusCounts { all: 3, drafts: 1, published: 2 });

        let paged = list(
            &app.state,
            ListQuery {
                status: Some("all".to_string()),
                page: Some("2".to_string()),
                limit: Some("2".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(paged.page, 2);
        assert_eq!(paged.total_pages, 2);
        assert_eq!(paged.posts.len(), 1);
        assert_eq!(paged.posts[0].title, "One");
    }

    #[tokio::test]
    async fn test_get_by_author() {
        let app = test_app().await;
        let ada = account(&app, "ada@example.com", false).await;
        let bob = account(&app, "bob@example.com", false).await;
        create(&app.state, &ada, input("First", None), None)
            .await
            .unwrap();
        create(&app.state, &ada, input("Second", None), None)
            .await
            .unwrap();

        let posts = get_by_author(&app.state, &ada.id.to_string()).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Second");

        assert!(matches!(
            get_by_author(&app.state, &bob.id.to_string()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_by_author(&app.state, "garbage").await,
            Err(AppError::NotFound(_))
        ));
    }
}
