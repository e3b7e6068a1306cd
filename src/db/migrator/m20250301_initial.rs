use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Composite uniqueness the entity derive cannot express.
const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_ingredients_name_unit ON ingredients(name, measurement_unit)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe_ingredient ON recipe_ingredients(recipe_id, ingredient_id)",
    "CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_recipes_author_id ON recipes(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name)",
];

async fn create_entity<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

async fn drop_entity<E: EntityTrait + 'static>(
    manager: &SchemaManager<'_>,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .drop_table(Table::drop().table(entity).if_exists().to_owned())
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        create_entity(manager, &schema, Users).await?;
        create_entity(manager, &schema, Tags).await?;
        create_entity(manager, &schema, Ingredients).await?;
        create_entity(manager, &schema, Recipes).await?;
        create_entity(manager, &schema, RecipeTags).await?;
        create_entity(manager, &schema, RecipeIngredients).await?;
        create_entity(manager, &schema, Favorites).await?;
        create_entity(manager, &schema, ShoppingCart).await?;
        create_entity(manager, &schema, Subscriptions).await?;

        let conn = manager.get_connection();
        for sql in INDEXES {
            conn.execute_unprepared(sql).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_entity(manager, Subscriptions).await?;
        drop_entity(manager, ShoppingCart).await?;
        drop_entity(manager, Favorites).await?;
        drop_entity(manager, RecipeIngredients).await?;
        drop_entity(manager, RecipeTags).await?;
        drop_entity(manager, Recipes).await?;
        drop_entity(manager, Ingredients).await?;
        drop_entity(manager, Tags).await?;
        drop_entity(manager, Users).await
    }
}
