//! Domain service for recipes, favorites and the shopping cart.

use thiserror::Error;

use crate::db::RecipeRecord;
use crate::domain::shopping_list::ShoppingList;
use crate::domain::{RecipeCollection, RecipeId, UserId};
use crate::entities::{recipes, users};
use crate::services::Paged;

pub use crate::db::RecipePatch;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe not found")]
    NotFound,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RecipeError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RecipeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::services::image::ImageError> for RecipeError {
    fn from(err: crate::services::image::ImageError) -> Self {
        match err {
            crate::services::image::ImageError::Io(e) => Self::Internal(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientInput {
    pub id: i32,
    pub amount: i32,
}

/// Everything needed to create a recipe. `image` is a data URL.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<i32>,
    pub ingredients: Vec<IngredientInput>,
}

/// A partial update. Tags and ingredients are required and replace the
/// stored sets; the other fields are optional.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<IngredientInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub author: Option<UserId>,
    pub tags: Vec<String>,
    /// `Some(false)` keeps recipes outside the viewer's favorites. Ignored
    /// for anonymous viewers.
    pub is_favorited: Option<bool>,
    /// Same as `is_favorited`, for the shopping cart.
    pub is_in_shopping_cart: Option<bool>,
    pub offset: u64,
    pub limit: u64,
}

/// A recipe with the viewer-dependent flags resolved.
#[derive(Debug, Clone)]
pub struct RecipeView {
    pub record: RecipeRecord,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub author_subscribed: bool,
}

#[async_trait::async_trait]
pub trait RecipeService: Send + Sync {
    async fn list(
        &self,
        viewer: Option<UserId>,
        query: RecipeQuery,
    ) -> Result<Paged<RecipeView>, RecipeError>;

    async fn get(&self, viewer: Option<UserId>, id: RecipeId) -> Result<RecipeView, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::Validation`] for empty or duplicate tags and
    /// ingredients, unknown ids, out-of-range amounts or cooking time, and a
    /// malformed image.
    async fn create(
        &self,
        author: &users::Model,
        draft: RecipeDraft,
    ) -> Result<RecipeView, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::Forbidden`] unless `actor` is the author or staff.
    async fn update(
        &self,
        actor: &users::Model,
        id: RecipeId,
        changes: RecipeChanges,
    ) -> Result<RecipeView, RecipeError>;

    async fn delete(&self, actor: &users::Model, id: RecipeId) -> Result<(), RecipeError>;

    /// The recipe's short code, assigned on first request if missing.
    async fn short_link(&self, id: RecipeId) -> Result<String, RecipeError>;

    async fn resolve_short_link(&self, code: &str) -> Result<RecipeId, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::Validation`] if the recipe is already present.
    async fn add_to(
        &self,
        collection: RecipeCollection,
        user: UserId,
        id: RecipeId,
    ) -> Result<recipes::Model, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::Validation`] if the recipe is not present.
    async fn remove_from(
        &self,
        collection: RecipeCollection,
        user: UserId,
        id: RecipeId,
    ) -> Result<(), RecipeError>;

    /// Aggregated ingredients of every recipe in the user's cart.
    async fn shopping_list(&self, user: UserId) -> Result<ShoppingList, RecipeError>;
}
