//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store};
use crate::domain::UserId;
use crate::entities::users;
use crate::services::Paged;
use crate::services::image::{ImageKind, ImageService};
use crate::services::user_service::{
    AuthorSummary, Registration, UserError, UserProfile, UserService,
};

pub struct SeaOrmUserService {
    store: Store,
    images: Arc<ImageService>,
    security: SecurityConfig,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store, images: Arc<ImageService>, security: SecurityConfig) -> Self {
        Self {
            store,
            images,
            security,
        }
    }

    async fn require_user(&self, id: UserId) -> Result<users::Model, UserError> {
        self.store.get_user(id).await?.ok_or(UserError::NotFound)
    }

    async fn summarize(
        &self,
        authors: Vec<users::Model>,
        recipes_limit: Option<u64>,
    ) -> Result<Vec<AuthorSummary>, UserError> {
        let ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
        let counts = self.store.count_recipes_by_authors(&ids).await?;

        let mut summaries = Vec::with_capacity(authors.len());
        for author in authors {
            let recipes = self
                .store
                .recipes_by_author(UserId::new(author.id), recipes_limit)
                .await?;
            summaries.push(AuthorSummary {
                recipes_count: counts.get(&author.id).copied().unwrap_or(0),
                recipes,
                profile: UserProfile {
                    user: author,
                    is_subscribed: true,
                },
            });
        }

        Ok(summaries)
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, registration: Registration) -> Result<users::Model, UserError> {
        if registration.password.chars().count() < self.security.min_password_length {
            return Err(UserError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        if self.store.email_taken(&registration.email).await? {
            return Err(UserError::Validation(
                "A user with that email already exists".to_string(),
            ));
        }

        if self.store.username_taken(&registration.username).await? {
            return Err(UserError::Validation(
                "A user with that username already exists".to_string(),
            ));
        }

        let user = self
            .store
            .create_user(
                NewUser {
                    email: registration.email,
                    username: registration.username,
                    first_name: registration.first_name,
                    last_name: registration.last_name,
                    password: registration.password,
                    is_staff: false,
                },
                &self.security,
            )
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn list(
        &self,
        viewer: Option<UserId>,
        offset: u64,
        limit: u64,
    ) -> Result<Paged<UserProfile>, UserError> {
        let (users, total) = self.store.list_users(offset, limit).await?;

        let followed = match viewer {
            Some(viewer) => {
                let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
                self.store.followed_among(viewer, &ids).await?
            }
            None => Default::default(),
        };

        let items = users
            .into_iter()
            .map(|user| UserProfile {
                is_subscribed: followed.contains(&user.id),
                user,
            })
            .collect();

        Ok(Paged { items, total })
    }

    async fn profile(&self, viewer: Option<UserId>, id: UserId) -> Result<UserProfile, UserError> {
        let user = self.require_user(id).await?;

        let is_subscribed = match viewer {
            Some(viewer) => self
                .store
                .followed_among(viewer, &[user.id])
                .await?
                .contains(&user.id),
            None => false,
        };

        Ok(UserProfile {
            user,
            is_subscribed,
        })
    }

    async fn set_avatar(&self, user_id: UserId, data_url: &str) -> Result<String, UserError> {
        self.require_user(user_id).await?;

        let path = self.images.save(data_url, ImageKind::Avatar).await?;
        let previous = self
            .store
            .set_user_avatar(user_id, Some(path.clone()))
            .await?;

        if let Some(previous) = previous {
            self.images.remove(&previous).await;
        }

        Ok(path)
    }

    async fn remove_avatar(&self, user_id: UserId) -> Result<(), UserError> {
        self.require_user(user_id).await?;

        if let Some(previous) = self.store.set_user_avatar(user_id, None).await? {
            self.images.remove(&previous).await;
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        subscriber: UserId,
        author: UserId,
        recipes_limit: Option<u64>,
    ) -> Result<AuthorSummary, UserError> {
        let author = self.require_user(author).await?;

        if author.id == subscriber.value() {
            return Err(UserError::Validation(
                "You cannot subscribe to yourself".to_string(),
            ));
        }

        if !self
            .store
            .subscribe(subscriber, UserId::new(author.id))
            .await?
        {
            return Err(UserError::Validation(
                "You are already subscribed to this author".to_string(),
            ));
        }

        info!(subscriber = %subscriber, author_id = author.id, "Subscribed");

        self.summarize(vec![author], recipes_limit)
            .await?
            .pop()
            .ok_or_else(|| UserError::Internal("Subscription summary missing".to_string()))
    }

    async fn unsubscribe(&self, subscriber: UserId, author: UserId) -> Result<(), UserError> {
        self.require_user(author).await?;

        if !self.store.unsubscribe(subscriber, author).await? {
            return Err(UserError::Validation(
                "You are not subscribed to this author".to_string(),
            ));
        }

        info!(subscriber = %subscriber, author_id = %author, "Unsubscribed");
        Ok(())
    }

    async fn subscriptions(
        &self,
        subscriber: UserId,
        offset: u64,
        limit: u64,
        recipes_limit: Option<u64>,
    ) -> Result<Paged<AuthorSummary>, UserError> {
        let (authors, total) = self
            .store
            .subscribed_authors(subscriber, offset, limit)
            .await?;
        let items = self.summarize(authors, recipes_limit).await?;

        Ok(Paged { items, total })
    }
}
