use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::IngredientId;
use crate::entities::ingredients;

pub struct IngredientRepository {
    conn: DatabaseConnection,
}

impl IngredientRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Ingredients ordered by name. A non-empty `prefix` keeps only names
    /// starting with it, ignoring case.
    ///
    /// The prefix match runs in Rust because `SQLite`'s `LIKE` only folds
    /// ASCII case.
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<ingredients::Model>> {
        let all = ingredients::Entity::find()
            .order_by_asc(ingredients::Column::Name)
            .order_by_asc(ingredients::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list ingredients")?;

        let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(all);
        };

        let prefix = prefix.to_lowercase();
        Ok(all
            .into_iter()
            .filter(|i| i.name.to_lowercase().starts_with(&prefix))
            .collect())
    }

    pub async fn get(&self, id: IngredientId) -> Result<Option<ingredients::Model>> {
        ingredients::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query ingredient")
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<ingredients::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        ingredients::Entity::find()
            .filter(ingredients::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query ingredients by IDs")
    }

    /// Inserts `(name, unit)` unless the pair exists. Returns whether a row
    /// was added.
    pub async fn insert_if_missing(&self, name: &str, measurement_unit: &str) -> Result<bool> {
        let existing = ingredients::Entity::find()
            .filter(ingredients::Column::Name.eq(name))
            .filter(ingredients::Column::MeasurementUnit.eq(measurement_unit))
            .one(&self.conn)
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        ingredients::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(measurement_unit.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to insert ingredient {name} ({measurement_unit})"))?;

        Ok(true)
    }
}
