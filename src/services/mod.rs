pub mod image;
pub use image::{ImageError, ImageKind, ImageService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{AuthorSummary, Registration, UserError, UserProfile, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod recipe_service;
pub mod recipe_service_impl;
pub use recipe_service::{
    IngredientInput, RecipeChanges, RecipeDraft, RecipeError, RecipeQuery, RecipeService,
    RecipeView,
};
pub use recipe_service_impl::SeaOrmRecipeService;

/// One page of results plus the total number of matches.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}
