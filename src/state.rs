//! Shared, read-only state handed to every handler.

use std::sync::Arc;

use crate::auth::token::TokenService;
use crate::config::AppConfig;
use crate::db::{PostStore, UserStore};
use crate::media::MediaStore;
use crate::summary::SummaryGenerator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub media: Arc<dyn MediaStore>,
    pub summarizer: Arc<dyn SummaryGenerator>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        posts: Arc<dyn PostStore>,
        media: Arc<dyn MediaStore>,
        summarizer: Arc<dyn SummaryGenerator>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl);
        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            users,
            posts,
            media,
            summarizer,
        }
    }
}

/// State wiring shared by the test modules: in-process store, media in a
/// temporary directory, summaries disabled unless a generator is supplied.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::db::MemoryStore;
    use crate::media::LocalMediaStore;
    use crate::summary::DisabledSummaryGenerator;

    pub(crate) const ADMIN_SECRET: &str = "let-me-in";

    pub(crate) struct TestApp {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub media: Arc<LocalMediaStore>,
        // Removed when the test ends.
        pub _dir: tempfile::TempDir,
    }

    pub(crate) async fn test_app_with(summarizer: Arc<dyn SummaryGenerator>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            jwt_secret: "test-secret".to_string(),
            admin_access_token: Some(ADMIN_SECRET.to_string()),
            upload_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };

        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(
            LocalMediaStore::new(dir.path(), "/uploads", config.max_upload_bytes)
                .await
                .unwrap(),
        );

        let state = AppState::new(
            config,
            store.clone(),
            store.clone(),
            media.clone(),
            summarizer,
        );

        TestApp {
            state,
            store,
            media,
            _dir: dir,
        }
    }

    pub(crate) async fn test_app() -> TestApp {
        test_app_with(Arc::new(DisabledSummaryGenerator)).await
    }
}
