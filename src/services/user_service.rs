//! Domain service for accounts, profiles and subscriptions.

use thiserror::Error;

use crate::domain::UserId;
use crate::entities::{recipes, users};
use crate::services::Paged;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::services::image::ImageError> for UserError {
    fn from(err: crate::services::image::ImageError) -> Self {
        match err {
            crate::services::image::ImageError::Io(e) => Self::Internal(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// A user as seen by a (possibly anonymous) viewer.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: users::Model,
    pub is_subscribed: bool,
}

/// An author the viewer follows, with a preview of their recipes.
#[derive(Debug, Clone)]
pub struct AuthorSummary {
    pub profile: UserProfile,
    pub recipes: Vec<recipes::Model>,
    pub recipes_count: u64,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] if the email or username is taken
    /// or the password is too short.
    async fn register(&self, registration: Registration) -> Result<users::Model, UserError>;

    async fn list(
        &self,
        viewer: Option<UserId>,
        offset: u64,
        limit: u64,
    ) -> Result<Paged<UserProfile>, UserError>;

    async fn profile(&self, viewer: Option<UserId>, id: UserId) -> Result<UserProfile, UserError>;

    /// Stores a new avatar from a data URL and returns its media path.
    async fn set_avatar(&self, user_id: UserId, data_url: &str) -> Result<String, UserError>;

    async fn remove_avatar(&self, user_id: UserId) -> Result<(), UserError>;

    /// # Errors
    ///
    /// Returns [`UserError::Validation`] for self-subscription or a duplicate.
    async fn subscribe(
        &self,
        subscriber: UserId,
        author: UserId,
        recipes_limit: Option<u64>,
    ) -> Result<AuthorSummary, UserError>;

    async fn unsubscribe(&self, subscriber: UserId, author: UserId) -> Result<(), UserError>;

    async fn subscriptions(
        &self,
        subscriber: UserId,
        offset: u64,
        limit: u64,
        recipes_limit: Option<u64>,
    ) -> Result<Paged<AuthorSummary>, UserError>;
}
