//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::domain::UserId;
use crate::entities::users;
use crate::services::auth_service::{AuthError, AuthService, LoginResult};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .store
            .verify_credentials(email.trim(), password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let user_id = UserId::new(user.id);
        let auth_token = self.store.issue_auth_token(user_id).await?;

        info!(user_id = %user_id, "User logged in");
        Ok(LoginResult {
            user_id,
            auth_token,
        })
    }

    async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.store.clear_auth_token(user_id).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<users::Model>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get_user_by_token(token).await?)
    }

    async fn authenticate_session(
        &self,
        user_id: UserId,
    ) -> Result<Option<users::Model>, AuthError> {
        Ok(self.store.get_user(user_id).await?)
    }

    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.chars().count() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "New password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.store.verify_user_password(&user, current_password).await? {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        self.store
            .update_user_password(user_id, new_password, &self.security)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}
