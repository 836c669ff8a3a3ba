//! Blog Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod routes;
pub mod services;
pub mod state;
pub mod summary;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use config::AppConfig;
use db::{MemoryStore, PgStore, PostStore, UserStore};
use media::LocalMediaStore;
use state::AppState;
use summary::{DisabledSummaryGenerator, GeminiSummaryGenerator, SummaryGenerator};

/// Headroom above the largest image for the rest of a multipart form.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the CORS layer from the configured origins. Origins that are not
/// valid header values are skipped.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let uploads = ServeDir::new(&state.config.upload_dir);
    let log_state = state.clone();

    Router::new()
        .route("/", get(routes::health::welcome))
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/profile", get(routes::auth::profile))
        .route("/api/auth/users", get(routes::auth::list_users))
        .route("/api/posts", get(routes::posts::list_posts))
        .route(
            "/api/posts/create",
            post(routes::posts::create_post).get(routes::posts::get_post_named_create),
        )
        .route(
            "/api/posts/author/{author_id}",
            get(routes::posts::posts_by_author),
        )
        // GET takes a slug, PUT and DELETE take an id.
        .route(
            "/api/posts/{key}",
            get(routes::posts::get_post)
                .put(routes::posts::update_post)
                .delete(routes::posts::delete_post),
        )
        .route("/api/ai/summary", post(routes::summary::generate_summary))
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            log_state,
            logging::middleware::log_request,
        ))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

/// Wire the collaborators: PostgreSQL when `DATABASE_URL` is set, the
/// in-process store otherwise; Gemini when an API key is set.
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let (users, posts): (Arc<dyn UserStore>, Arc<dyn PostStore>) = match &config.database {
        Some(db_config) => {
            let store = Arc::new(
                PgStore::connect(db_config)
                    .await
                    .context("failed to connect to the database")?,
            );
            tracing::info!("Using PostgreSQL store");
            (store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Data is kept in memory and lost on restart.");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let media = LocalMediaStore::new(&config.upload_dir, "/uploads", config.max_upload_bytes)
        .await
        .context("failed to prepare the upload directory")?;

    let summarizer: Arc<dyn SummaryGenerator> = match config.gemini_api_key.as_deref() {
        Some(key) => Arc::new(GeminiSummaryGenerator::new(
            &config.gemini_api_base,
            key,
            &config.gemini_model,
        )),
        None => {
            tracing::info!("GEMINI_API_KEY not set. Summaries are disabled.");
            Arc::new(DisabledSummaryGenerator)
        }
    };

    if config.admin_access_token.is_none() {
        tracing::info!("ADMIN_ACCESS_TOKEN not set. Registration cannot create admins.");
    }

    Ok(AppState::new(config, users, posts, Arc::new(media), summarizer))
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Held for the programme's lifetime; dropping them loses buffered lines.
    let _log_guards = logging::init(&config);

    config.validate()?;
    routes::health::init_start_time();

    let addr = config.bind_addr()?;
    let state = build_state(config).await?;
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_app;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let app = test_app().await;
        let res = create_app(app.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_propagated() {
        let app = test_app().await;
        let req = Request::get("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let res = create_app(app.state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_authenticated_request_passes_logging_layer() {
        let app = test_app().await;
        let token = app
            .state
            .tokens
            .issue(uuid::Uuid::new_v4(), "ada@example.com", false)
            .unwrap();
        let req = Request::get("/health")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let res = create_app(app.state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = test_app().await;
        let res = create_app(app.state.clone())
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_build_state_without_database_uses_memory() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            upload_dir: dir.path().join("media"),
            ..AppConfig::default()
        };
        let state = build_state(config).await.unwrap();
        assert!(state.posts.ping().await.is_ok());
        assert!(dir.path().join("media").is_dir());
    }

    #[test]
    fn test_cors_accepts_configured_origins() {
        let config = AppConfig {
            allowed_origins: vec!["https://blog.example.com".to_string(), "not a header\n".to_string()],
            ..AppConfig::default()
        };
        let _layer = configure_cors(&config);
    }
}
