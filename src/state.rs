use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::domain::short_link::ShortLinkGenerator;
use crate::services::{
    AuthService, ImageService, RecipeService, SeaOrmAuthService, SeaOrmRecipeService,
    SeaOrmUserService, UserService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub image_service: Arc<ImageService>,

    pub short_links: Arc<ShortLinkGenerator>,

    pub auth_service: Arc<dyn AuthService>,

    pub user_service: Arc<dyn UserService>,

    pub recipe_service: Arc<dyn RecipeService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let links = ShortLinkGenerator::from_os_rng();
        Self::with_short_links(config, links).await
    }

    /// Builds the state around a caller-supplied generator, e.g. a seeded one
    /// in tests.
    pub async fn with_short_links(
        config: Config,
        links: ShortLinkGenerator,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let image_service = Arc::new(ImageService::new(
            &config.general.media_path,
            config.recipes.max_image_bytes,
        ));

        let short_links = Arc::new(
            links
                .with_length(config.recipes.short_link_length)
                .with_max_attempts(config.recipes.short_link_max_attempts),
        );

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let user_service = Arc::new(SeaOrmUserService::new(
            store.clone(),
            image_service.clone(),
            config.security.clone(),
        )) as Arc<dyn UserService + Send + Sync + 'static>;

        let recipe_service = Arc::new(SeaOrmRecipeService::new(
            store.clone(),
            image_service.clone(),
            short_links.clone(),
            config.recipes.clone(),
        )) as Arc<dyn RecipeService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(config),
            store,
            image_service,
            short_links,
            auth_service,
            user_service,
            recipe_service,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
