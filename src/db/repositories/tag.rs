use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::TagId;
use crate::entities::tags;

pub struct TagRepository {
    conn: DatabaseConnection,
}

impl TagRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<tags::Model>> {
        tags::Entity::find()
            .order_by_asc(tags::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list tags")
    }

    pub async fn get(&self, id: TagId) -> Result<Option<tags::Model>> {
        tags::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query tag")
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<tags::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        tags::Entity::find()
            .filter(tags::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query tags by IDs")
    }

    /// Inserts a tag unless its name or slug is already used. Returns `None`
    /// when it already exists.
    pub async fn create(&self, name: &str, slug: &str) -> Result<Option<tags::Model>> {
        let existing = tags::Entity::find()
            .filter(
                tags::Column::Name
                    .eq(name)
                    .or(tags::Column::Slug.eq(slug)),
            )
            .one(&self.conn)
            .await?;

        if existing.is_some() {
            return Ok(None);
        }

        let model = tags::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert tag")?;

        Ok(Some(model))
    }
}
