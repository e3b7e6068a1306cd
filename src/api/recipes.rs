use axum::{
    Json,
    extract::{OriginalUri, Path, Query, RawQuery, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{parse_flag, validate_id, validate_page};
use super::{
    ApiError, AppState, BaseUrl, Page, PageQuery, RecipeDto, ShortLinkDto, ShortRecipeDto,
};
use crate::domain::shopping_list::ShoppingListFormat;
use crate::domain::{RecipeCollection, RecipeId, UserId};
use crate::services::{IngredientInput, RecipeChanges, RecipeDraft, RecipeQuery};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: i32,
    pub amount: i32,
}

impl From<IngredientAmountRequest> for IngredientInput {
    fn from(item: IngredientAmountRequest) -> Self {
        Self {
            id: item.id,
            amount: item.amount,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmountRequest>,
    pub tags: Vec<i32>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Deserialize)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    pub tags: Option<Vec<i32>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// Parses the list query by hand since `tags` may repeat.
fn parse_list_query(raw: Option<&str>) -> Result<(RecipeQuery, PageQuery), ApiError> {
    let mut query = RecipeQuery::default();
    let mut page = PageQuery::default();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "author" => {
                let id = value
                    .parse::<i32>()
                    .map_err(|_| ApiError::validation(format!("Invalid author: {}", value)))?;
                query.author = Some(UserId::new(validate_id(id)?));
            }
            "tags" => {
                if !value.is_empty() {
                    query.tags.push(value.into_owned());
                }
            }
            "is_favorited" => query.is_favorited = Some(parse_flag("is_favorited", &value)?),
            "is_in_shopping_cart" => {
                query.is_in_shopping_cart = Some(parse_flag("is_in_shopping_cart", &value)?);
            }
            "page" => {
                page.page =
                    Some(value.parse().map_err(|_| {
                        ApiError::validation(format!("Invalid page: {}", value))
                    })?);
            }
            "limit" => {
                page.limit =
                    Some(value.parse().map_err(|_| {
                        ApiError::validation(format!("Invalid limit: {}", value))
                    })?);
            }
            _ => {}
        }
    }

    Ok((query, page))
}

// ============================================================================
// CRUD
// ============================================================================

/// GET /recipes
pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    viewer: Option<CurrentUser>,
    base: BaseUrl,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<RecipeDto>>, ApiError> {
    let (mut query, page_query) = parse_list_query(raw.as_deref())?;
    let params = validate_page(&page_query, &state.config().server)?;
    query.offset = params.offset();
    query.limit = params.limit;

    let paged = state
        .recipes()
        .list(viewer.map(|u| u.id()), query)
        .await?;

    let results = paged
        .items
        .into_iter()
        .map(|view| RecipeDto::new(view, &base))
        .collect();

    Ok(Json(Page::new(results, paged.total, params, &base, &uri)))
}

/// POST /recipes
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeDto>), ApiError> {
    let draft = RecipeDraft {
        name: payload.name,
        text: payload.text,
        cooking_time: payload.cooking_time,
        image: payload.image,
        tags: payload.tags,
        ingredients: payload.ingredients.into_iter().map(Into::into).collect(),
    };

    let view = state.recipes().create(&user.0, draft).await?;

    Ok((StatusCode::CREATED, Json(RecipeDto::new(view, &base))))
}

/// GET /recipes/{id}
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    viewer: Option<CurrentUser>,
    base: BaseUrl,
    Path(id): Path<i32>,
) -> Result<Json<RecipeDto>, ApiError> {
    let id = validate_id(id)?;

    let view = state
        .recipes()
        .get(viewer.map(|u| u.id()), RecipeId::new(id))
        .await?;

    Ok(Json(RecipeDto::new(view, &base)))
}

/// PATCH /recipes/{id}
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeDto>, ApiError> {
    let id = validate_id(id)?;

    let changes = RecipeChanges {
        name: payload.name,
        text: payload.text,
        cooking_time: payload.cooking_time,
        image: payload.image,
        tags: payload.tags,
        ingredients: payload
            .ingredients
            .map(|items| items.into_iter().map(Into::into).collect()),
    };

    let view = state
        .recipes()
        .update(&user.0, RecipeId::new(id), changes)
        .await?;

    Ok(Json(RecipeDto::new(view, &base)))
}

/// DELETE /recipes/{id}
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let id = validate_id(id)?;

    state.recipes().delete(&user.0, RecipeId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Short links
// ============================================================================

/// GET /recipes/{id}/get-link
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    base: BaseUrl,
    Path(id): Path<i32>,
) -> Result<Json<ShortLinkDto>, ApiError> {
    let id = validate_id(id)?;

    let code = state.recipes().short_link(RecipeId::new(id)).await?;

    Ok(Json(ShortLinkDto {
        short_link: base.short_link(&code),
    }))
}

// ============================================================================
// Favorites & shopping cart
// ============================================================================

async fn add_to_collection(
    state: &AppState,
    collection: RecipeCollection,
    user: &CurrentUser,
    base: &BaseUrl,
    id: i32,
) -> Result<(StatusCode, Json<ShortRecipeDto>), ApiError> {
    let id = validate_id(id)?;

    let recipe = state
        .recipes()
        .add_to(collection, user.id(), RecipeId::new(id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ShortRecipeDto::new(&recipe, base)),
    ))
}

async fn remove_from_collection(
    state: &AppState,
    collection: RecipeCollection,
    user: &CurrentUser,
    id: i32,
) -> Result<StatusCode, ApiError> {
    let id = validate_id(id)?;

    state
        .recipes()
        .remove_from(collection, user.id(), RecipeId::new(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/favorite
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ShortRecipeDto>), ApiError> {
    add_to_collection(&state, RecipeCollection::Favorites, &user, &base, id).await
}

/// DELETE /recipes/{id}/favorite
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_from_collection(&state, RecipeCollection::Favorites, &user, id).await
}

/// POST /recipes/{id}/shopping_cart
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ShortRecipeDto>), ApiError> {
    add_to_collection(&state, RecipeCollection::ShoppingCart, &user, &base, id).await
}

/// DELETE /recipes/{id}/shopping_cart
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_from_collection(&state, RecipeCollection::ShoppingCart, &user, id).await
}

/// GET /recipes/download_shopping_cart
/// Aggregated ingredients of every recipe in the cart, as an attachment
pub async fn download_shopping_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw
            .parse::<ShoppingListFormat>()
            .map_err(ApiError::validation)?,
        None => state.config().recipes.shopping_list_format,
    };

    let list = state.recipes().shopping_list(user.id()).await?;
    let body = format.render(&list);

    metrics::counter!("shopping_list_downloads_total", "format" => format.extension())
        .increment(1);
    tracing::info!(
        user_id = user.0.id,
        items = list.len(),
        format = format.extension(),
        "Shopping list downloaded"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format.content_disposition()),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_collects_repeated_tags() {
        let (query, page) =
            parse_list_query(Some("tags=breakfast&tags=lunch&author=3&is_favorited=1&page=2"))
                .unwrap();

        assert_eq!(query.tags, vec!["breakfast", "lunch"]);
        assert_eq!(query.author, Some(UserId::new(3)));
        assert_eq!(query.is_favorited, Some(true));
        assert_eq!(query.is_in_shopping_cart, None);
        assert_eq!(page.page, Some(2));
        assert_eq!(page.limit, None);
    }

    #[test]
    fn list_query_rejects_garbage() {
        assert!(parse_list_query(Some("author=abc")).is_err());
        assert!(parse_list_query(Some("is_in_shopping_cart=maybe")).is_err());
        assert!(parse_list_query(Some("limit=-1")).is_err());
    }

    #[test]
    fn empty_query_uses_defaults() {
        let (query, page) = parse_list_query(None).unwrap();
        assert!(query.tags.is_empty());
        assert!(query.author.is_none());
        assert!(query.is_favorited.is_none());
        assert!(page.page.is_none());
    }

    #[test]
    fn zero_flag_is_kept_as_exclusion() {
        let (query, _) = parse_list_query(Some("is_in_shopping_cart=0")).unwrap();
        assert_eq!(query.is_in_shopping_cart, Some(false));
        assert_eq!(query.is_favorited, None);
    }
}
