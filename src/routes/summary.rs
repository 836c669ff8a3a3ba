/**
 * Summary Route
 * Generates a short excerpt for a post title
 */
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::form::FormData;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: String,
}

/// POST /api/ai/summary
pub async fn generate_summary(
    State(state): State<AppState>,
    user: AuthUser,
    form: FormData<SummaryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = form.fields.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let summary = state.summarizer.summarize(title).await?;
    tracing::info!(user_id = %user.id, chars = summary.len(), "summary generated");

    Ok(Json(SummaryResponse {
        success: true,
        summary,
    }))
}
