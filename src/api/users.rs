use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{
    validate_email, validate_id, validate_page, validate_person_name, validate_username,
};
use super::{
    ApiError, AppState, AuthorDto, AvatarDto, BaseUrl, CreatedUserDto, Page, PageQuery, UserDto,
};
use crate::domain::UserId;
use crate::services::Registration;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct AvatarRequest {
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub recipes_limit: Option<u64>,
}

#[derive(Deserialize)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<u64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    viewer: Option<CurrentUser>,
    base: BaseUrl,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserDto>>, ApiError> {
    let params = validate_page(&query, &state.config().server)?;

    let paged = state
        .users()
        .list(viewer.map(|u| u.id()), params.offset(), params.limit)
        .await?;

    let results = paged
        .items
        .iter()
        .map(|profile| UserDto::from_profile(profile, &base))
        .collect();

    Ok(Json(Page::new(results, paged.total, params, &base, &uri)))
}

/// POST /users
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CreatedUserDto>), ApiError> {
    let registration = Registration {
        email: validate_email(&payload.email)?.to_string(),
        username: validate_username(&payload.username)?.to_string(),
        first_name: validate_person_name("First name", &payload.first_name)?.to_string(),
        last_name: validate_person_name("Last name", &payload.last_name)?.to_string(),
        password: payload.password,
    };

    let user = state.users().register(registration).await?;

    Ok((StatusCode::CREATED, Json(CreatedUserDto::from(user))))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    viewer: Option<CurrentUser>,
    base: BaseUrl,
    Path(id): Path<i32>,
) -> Result<Json<UserDto>, ApiError> {
    let id = validate_id(id)?;

    let profile = state
        .users()
        .profile(viewer.map(|u| u.id()), UserId::new(id))
        .await?;

    Ok(Json(UserDto::from_profile(&profile, &base)))
}

/// GET /users/me
pub async fn me(user: CurrentUser, base: BaseUrl) -> Json<UserDto> {
    Json(UserDto::new(&user.0, false, &base))
}

/// PUT /users/me/avatar
pub async fn set_avatar(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Json(payload): Json<AvatarRequest>,
) -> Result<Json<AvatarDto>, ApiError> {
    let data_url = payload
        .avatar
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Field 'avatar' is required"))?;

    let path = state.users().set_avatar(user.id(), &data_url).await?;

    Ok(Json(AvatarDto {
        avatar: Some(base.media(&path)),
    }))
}

/// DELETE /users/me/avatar
pub async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.users().remove_avatar(user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/set_password
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth()
        .change_password(user.id(), &payload.current_password, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/subscriptions
pub async fn subscriptions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<Page<AuthorDto>>, ApiError> {
    let page_query = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let params = validate_page(&page_query, &state.config().server)?;

    let paged = state
        .users()
        .subscriptions(
            user.id(),
            params.offset(),
            params.limit,
            query.recipes_limit,
        )
        .await?;

    let results = paged
        .items
        .iter()
        .map(|summary| AuthorDto::new(summary, &base))
        .collect();

    Ok(Json(Page::new(results, paged.total, params, &base, &uri)))
}

/// POST /users/{id}/subscribe
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    base: BaseUrl,
    Path(id): Path<i32>,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<(StatusCode, Json<AuthorDto>), ApiError> {
    let id = validate_id(id)?;

    let summary = state
        .users()
        .subscribe(user.id(), UserId::new(id), query.recipes_limit)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthorDto::new(&summary, &base))))
}

/// DELETE /users/{id}/subscribe
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let id = validate_id(id)?;

    state.users().unsubscribe(user.id(), UserId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
