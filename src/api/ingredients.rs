use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_id;
use super::{ApiError, AppState, IngredientDto};
use crate::domain::IngredientId;

#[derive(Deserialize)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix.
    pub name: Option<String>,
}

/// GET /ingredients
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<IngredientDto>>, ApiError> {
    let ingredients = state
        .store()
        .list_ingredients(query.name.as_deref())
        .await?;

    Ok(Json(
        ingredients.into_iter().map(IngredientDto::from).collect(),
    ))
}

/// GET /ingredients/{id}
pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<IngredientDto>, ApiError> {
    let id = validate_id(id)?;

    let ingredient = state
        .store()
        .get_ingredient(IngredientId::new(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient", id))?;

    Ok(Json(IngredientDto::from(ingredient)))
}
