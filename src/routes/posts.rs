/**
 * Blog Post Routes
 * Create, list, read, update and delete posts
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::form::FormData;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::services::posts::{self, ListQuery, NewPostInput, PostPage, PostPatch, PostView};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    pub posts: PostView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: PostPage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub success: bool,
    pub post: PostView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub success: bool,
    pub message: String,
    pub post: PostView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorPostsResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/posts/create
/// JSON or multipart; the cover image is the `coverImage` file field.
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    mut form: FormData<NewPostInput>,
) -> Result<impl IntoResponse, AppError> {
    let cover = form.file("coverImage");
    let post = posts::create(&state, &user, form.fields, cover).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: "Blog post created successfully".to_string(),
            posts: post,
        }),
    ))
}

/// GET /api/posts?status=&page=&limit=
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = posts::list(&state, query).await?;
    Ok(Json(ListResponse {
        success: true,
        page,
    }))
}

/// GET /api/posts/{slug}
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::get_by_slug(&state, &slug).await?;
    Ok(Json(PostResponse {
        success: true,
        post,
    }))
}

/// GET /api/posts/create
/// The static create route shadows the post whose slug is `create`.
pub async fn get_post_named_create(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    get_post(State(state), Path("create".to_string())).await
}

/// PUT /api/posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    mut form: FormData<PostPatch>,
) -> Result<impl IntoResponse, AppError> {
    let cover = form.file("coverImage");
    let post = posts::update(&state, &user, &id, form.fields, cover).await?;

    Ok(Json(UpdatedResponse {
        success: true,
        message: "Blog post updated successfully".to_string(),
        post,
    }))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    posts::delete(&state, &user, &id).await?;

    Ok(Json(DeletedResponse {
        success: true,
        message: "Blog post deleted successfully".to_string(),
    }))
}

/// GET /api/posts/author/{author_id}
pub async fn posts_by_author(
    State(state): State<AppState>,
    Path(author_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let posts = posts::get_by_author(&state, &author_id).await?;
    Ok(Json(AuthorPostsResponse {
        success: true,
        posts,
    }))
}
