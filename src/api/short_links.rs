use axum::{
    extract::{Path, State},
    response::Redirect,
};
use std::sync::Arc;

use super::{ApiError, AppState};

/// GET /s/{code}
/// Redirects a short link to the recipe page
pub async fn follow_short_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Redirect, ApiError> {
    let recipe_id = state
        .recipes()
        .resolve_short_link(&code)
        .await
        .map_err(|e| match e {
            crate::services::RecipeError::NotFound => {
                ApiError::NotFound(format!("Short link '{}' not found", code))
            }
            other => other.into(),
        })?;

    tracing::debug!(code = %code, recipe_id = %recipe_id, "Short link resolved");
    Ok(Redirect::to(&format!("/recipes/{}/", recipe_id)))
}
