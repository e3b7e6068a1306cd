use axum::extract::FromRequestParts;
use axum::http::{Uri, request::Parts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use super::AppState;
use crate::entities::{ingredients, recipes, tags, users};
use crate::services::{AuthorSummary, RecipeView, UserProfile};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

// ============================================================================
// Absolute URLs
// ============================================================================

/// Scheme and authority used for absolute links, e.g. `https://foodgram.example`.
///
/// Taken from `server.public_url` when set, otherwise from the request's
/// `Host` and `X-Forwarded-Proto` headers.
#[derive(Debug, Clone)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    #[must_use]
    pub fn media(&self, relative: &str) -> String {
        format!("{}/media/{}", self.0, relative)
    }

    #[must_use]
    pub fn short_link(&self, code: &str) -> String {
        format!("{}/s/{}", self.0, code)
    }
}

impl FromRequestParts<Arc<AppState>> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let public_url = state.config().server.public_url.trim_end_matches('/');
        if !public_url.is_empty() {
            return Ok(Self(public_url.to_string()));
        }

        let host = parts
            .headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("http");

        Ok(Self(format!("{scheme}://{host}")))
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub limit: u64,
}

impl PageParams {
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: u64, params: PageParams, base: &BaseUrl, uri: &Uri) -> Self {
        let next = (params.page * params.limit < count)
            .then(|| page_url(base, uri, params.page + 1))
            .flatten();
        let previous = (params.page > 1)
            .then(|| page_url(base, uri, params.page - 1))
            .flatten();

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// The request URL with its `page` parameter replaced.
fn page_url(base: &BaseUrl, uri: &Uri, page: u64) -> Option<String> {
    let mut url = url::Url::parse(&format!("{}{}", base.0, uri.path())).ok()?;

    let kept: Vec<(String, String)> = url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());

    Some(url.to_string())
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TokenDto {
    pub auth_token: String,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserDto {
    pub fn new(user: &users::Model, is_subscribed: bool, base: &BaseUrl) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar: user.avatar.as_deref().map(|a| base.media(a)),
            is_subscribed,
        }
    }

    pub fn from_profile(profile: &UserProfile, base: &BaseUrl) -> Self {
        Self::new(&profile.user, profile.is_subscribed, base)
    }
}

/// Response to a successful registration.
#[derive(Debug, Serialize)]
pub struct CreatedUserDto {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<users::Model> for CreatedUserDto {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvatarDto {
    pub avatar: Option<String>,
}

/// A followed author with a preview of their recipes.
#[derive(Debug, Serialize)]
pub struct AuthorDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub recipes: Vec<ShortRecipeDto>,
    pub recipes_count: u64,
}

impl AuthorDto {
    pub fn new(summary: &AuthorSummary, base: &BaseUrl) -> Self {
        Self {
            user: UserDto::from_profile(&summary.profile, base),
            recipes: summary
                .recipes
                .iter()
                .map(|r| ShortRecipeDto::new(r, base))
                .collect(),
            recipes_count: summary.recipes_count,
        }
    }
}

// ============================================================================
// Tags & ingredients
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TagDto {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<tags::Model> for TagDto {
    fn from(tag: tags::Model) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            slug: tag.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientDto {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredients::Model> for IngredientDto {
    fn from(ingredient: ingredients::Model) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

// ============================================================================
// Recipes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RecipeIngredientDto {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeDto {
    pub id: i32,
    pub tags: Vec<TagDto>,
    pub author: UserDto,
    pub ingredients: Vec<RecipeIngredientDto>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeDto {
    pub fn new(view: RecipeView, base: &BaseUrl) -> Self {
        let record = view.record;
        Self {
            id: record.recipe.id,
            tags: record.tags.into_iter().map(TagDto::from).collect(),
            author: UserDto::new(&record.author, view.author_subscribed, base),
            ingredients: record
                .ingredients
                .into_iter()
                .map(|row| RecipeIngredientDto {
                    id: row.ingredient.id,
                    name: row.ingredient.name,
                    measurement_unit: row.ingredient.measurement_unit,
                    amount: row.amount,
                })
                .collect(),
            is_favorited: view.is_favorited,
            is_in_shopping_cart: view.is_in_shopping_cart,
            image: base.media(&record.recipe.image),
            name: record.recipe.name,
            text: record.recipe.text,
            cooking_time: record.recipe.cooking_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShortRecipeDto {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl ShortRecipeDto {
    pub fn new(recipe: &recipes::Model, base: &BaseUrl) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: base.media(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShortLinkDto {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseUrl {
        BaseUrl("http://testserver".to_string())
    }

    #[test]
    fn first_page_links_forward_only() {
        let uri: Uri = "/api/recipes?limit=2&tags=lunch".parse().unwrap();
        let params = PageParams { page: 1, limit: 2 };
        let page = Page::new(vec![1, 2], 5, params, &base(), &uri);

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/api/recipes?limit=2&tags=lunch&page=2")
        );
        assert!(page.previous.is_none());
    }

    #[test]
    fn last_page_links_back_only() {
        let uri: Uri = "/api/users?page=3&limit=2".parse().unwrap();
        let params = PageParams { page: 3, limit: 2 };
        let page = Page::new(vec![5], 5, params, &base(), &uri);

        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/users?limit=2&page=2")
        );
        assert_eq!(params.offset(), 4);
    }

    #[test]
    fn media_paths_become_absolute() {
        assert_eq!(
            base().media("recipes/a.png"),
            "http://testserver/media/recipes/a.png"
        );
        assert_eq!(base().short_link("Ab3dE9"), "http://testserver/s/Ab3dE9");
    }
}
