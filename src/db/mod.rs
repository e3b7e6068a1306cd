use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::shopping_list::CartLine;
use crate::domain::short_link::ShortLinkGenerator;
use crate::domain::{IngredientId, RecipeCollection, RecipeId, TagId, UserId};
use crate::entities::{ingredients, recipes, tags, users};

pub mod migrator;
pub mod repositories;

pub use repositories::recipe::{
    IngredientAmount, MembershipFilter, NewRecipe, RecipeFilter, RecipeIngredientRow, RecipePatch,
    RecipeRecord,
};
pub use repositories::user::NewUser;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn tag_repo(&self) -> repositories::tag::TagRepository {
        repositories::tag::TagRepository::new(self.conn.clone())
    }

    fn ingredient_repo(&self) -> repositories::ingredient::IngredientRepository {
        repositories::ingredient::IngredientRepository::new(self.conn.clone())
    }

    fn recipe_repo(&self) -> repositories::recipe::RecipeRepository {
        repositories::recipe::RecipeRepository::new(self.conn.clone())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(&self, user: NewUser, config: &SecurityConfig) -> Result<users::Model> {
        self.user_repo().create(user, config).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_users(&self, ids: &[i32]) -> Result<Vec<users::Model>> {
        self.user_repo().get_by_ids(ids).await
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_token(token).await
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        self.user_repo().email_taken(email).await
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        self.user_repo().username_taken(username).await
    }

    pub async fn list_users(&self, offset: u64, limit: u64) -> Result<(Vec<users::Model>, u64)> {
        self.user_repo().list(offset, limit).await
    }

    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<users::Model>> {
        self.user_repo().verify_credentials(email, password).await
    }

    pub async fn verify_user_password(&self, user: &users::Model, password: &str) -> Result<bool> {
        self.user_repo().verify_password(user, password).await
    }

    pub async fn update_user_password(
        &self,
        id: UserId,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<()> {
        self.user_repo()
            .update_password(id, new_password, config)
            .await
    }

    pub async fn issue_auth_token(&self, id: UserId) -> Result<String> {
        self.user_repo().issue_token(id).await
    }

    pub async fn clear_auth_token(&self, id: UserId) -> Result<()> {
        self.user_repo().clear_token(id).await
    }

    pub async fn set_user_avatar(
        &self,
        id: UserId,
        avatar: Option<String>,
    ) -> Result<Option<String>> {
        self.user_repo().set_avatar(id, avatar).await
    }

    // ========== Tags ==========

    pub async fn list_tags(&self) -> Result<Vec<tags::Model>> {
        self.tag_repo().list().await
    }

    pub async fn get_tag(&self, id: TagId) -> Result<Option<tags::Model>> {
        self.tag_repo().get(id).await
    }

    pub async fn get_tags(&self, ids: &[i32]) -> Result<Vec<tags::Model>> {
        self.tag_repo().get_by_ids(ids).await
    }

    pub async fn create_tag(&self, name: &str, slug: &str) -> Result<Option<tags::Model>> {
        self.tag_repo().create(name, slug).await
    }

    // ========== Ingredients ==========

    pub async fn list_ingredients(&self, prefix: Option<&str>) -> Result<Vec<ingredients::Model>> {
        self.ingredient_repo().list(prefix).await
    }

    pub async fn get_ingredient(&self, id: IngredientId) -> Result<Option<ingredients::Model>> {
        self.ingredient_repo().get(id).await
    }

    pub async fn get_ingredients(&self, ids: &[i32]) -> Result<Vec<ingredients::Model>> {
        self.ingredient_repo().get_by_ids(ids).await
    }

    pub async fn insert_ingredient_if_missing(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<bool> {
        self.ingredient_repo()
            .insert_if_missing(name, measurement_unit)
            .await
    }

    // ========== Recipes ==========

    pub async fn get_recipe(&self, id: RecipeId) -> Result<Option<recipes::Model>> {
        self.recipe_repo().get(id).await
    }

    pub async fn get_recipe_by_short_link(&self, code: &str) -> Result<Option<recipes::Model>> {
        self.recipe_repo().get_by_short_link(code).await
    }

    pub async fn ensure_short_link(
        &self,
        id: RecipeId,
        links: &ShortLinkGenerator,
    ) -> Result<Option<String>> {
        self.recipe_repo().ensure_short_link(id, links).await
    }

    pub async fn create_recipe(
        &self,
        recipe: NewRecipe,
        links: &ShortLinkGenerator,
    ) -> Result<recipes::Model> {
        self.recipe_repo().create(recipe, links).await
    }

    pub async fn update_recipe(
        &self,
        id: RecipeId,
        patch: RecipePatch,
        tag_ids: &[TagId],
        ingredients: &[IngredientAmount],
    ) -> Result<Option<recipes::Model>> {
        self.recipe_repo()
            .update(id, patch, tag_ids, ingredients)
            .await
    }

    pub async fn delete_recipe(&self, id: RecipeId) -> Result<Option<recipes::Model>> {
        self.recipe_repo().delete(id).await
    }

    pub async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<recipes::Model>, u64)> {
        self.recipe_repo().list(filter, offset, limit).await
    }

    pub async fn recipes_by_author(
        &self,
        author: UserId,
        limit: Option<u64>,
    ) -> Result<Vec<recipes::Model>> {
        self.recipe_repo().by_author(author, limit).await
    }

    pub async fn count_recipes_by_authors(&self, author_ids: &[i32]) -> Result<HashMap<i32, u64>> {
        self.recipe_repo().count_by_authors(author_ids).await
    }

    pub async fn load_recipe_records(
        &self,
        recipes: Vec<recipes::Model>,
    ) -> Result<Vec<RecipeRecord>> {
        self.recipe_repo().load_records(recipes).await
    }

    pub async fn add_to_collection(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe: RecipeId,
    ) -> Result<bool> {
        self.recipe_repo()
            .add_to_collection(collection, user, recipe)
            .await
    }

    pub async fn remove_from_collection(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe: RecipeId,
    ) -> Result<bool> {
        self.recipe_repo()
            .remove_from_collection(collection, user, recipe)
            .await
    }

    pub async fn collection_members(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        self.recipe_repo()
            .collection_members(collection, user, recipe_ids)
            .await
    }

    pub async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>> {
        self.recipe_repo().cart_lines(user).await
    }

    // ========== Subscriptions ==========

    pub async fn subscribe(&self, subscriber: UserId, author: UserId) -> Result<bool> {
        self.subscription_repo().subscribe(subscriber, author).await
    }

    pub async fn unsubscribe(&self, subscriber: UserId, author: UserId) -> Result<bool> {
        self.subscription_repo().unsubscribe(subscriber, author).await
    }

    pub async fn followed_among(
        &self,
        subscriber: UserId,
        author_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        self.subscription_repo()
            .followed_among(subscriber, author_ids)
            .await
    }

    pub async fn subscribed_authors(
        &self,
        subscriber: UserId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<users::Model>, u64)> {
        self.subscription_repo()
            .authors(subscriber, offset, limit)
            .await
    }
}
