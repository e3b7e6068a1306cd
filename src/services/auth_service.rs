//! Domain service for authentication.
//!
//! Handles token login and logout, token lookup and password changes.

use serde::Serialize;
use thiserror::Error;

use crate::domain::UserId;
use crate::entities::users;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unable to log in with provided credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Login result containing the user and their auth token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user_id: UserId,
    pub auth_token: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies email and password and returns the user's token, issuing one
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Revokes the user's token.
    async fn logout(&self, user_id: UserId) -> Result<(), AuthError>;

    /// Resolves a token to its user.
    async fn authenticate_token(&self, token: &str) -> Result<Option<users::Model>, AuthError>;

    /// Resolves a session's user id to its user.
    async fn authenticate_session(
        &self,
        user_id: UserId,
    ) -> Result<Option<users::Model>, AuthError>;

    /// Changes a user's password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is wrong or
    /// the new one is invalid.
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
