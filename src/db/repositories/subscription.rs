use anyhow::{Context, Result};
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::HashSet;

use crate::domain::UserId;
use crate::entities::{prelude::*, subscriptions, users};

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `false` if the subscription already existed.
    pub async fn subscribe(&self, subscriber: UserId, author: UserId) -> Result<bool> {
        let inserted = Subscriptions::insert(subscriptions::ActiveModel {
            subscriber_id: Set(subscriber.value()),
            author_id: Set(author.value()),
        })
        .on_conflict(
            OnConflict::columns([
                subscriptions::Column::SubscriberId,
                subscriptions::Column::AuthorId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await
        .context("Failed to insert subscription")?;

        Ok(inserted > 0)
    }

    /// Returns `false` if there was nothing to remove.
    pub async fn unsubscribe(&self, subscriber: UserId, author: UserId) -> Result<bool> {
        let result = Subscriptions::delete_many()
            .filter(subscriptions::Column::SubscriberId.eq(subscriber.value()))
            .filter(subscriptions::Column::AuthorId.eq(author.value()))
            .exec(&self.conn)
            .await
            .context("Failed to delete subscription")?;

        Ok(result.rows_affected > 0)
    }

    /// The subset of `author_ids` the subscriber follows.
    pub async fn followed_among(
        &self,
        subscriber: UserId,
        author_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = Subscriptions::find()
            .filter(subscriptions::Column::SubscriberId.eq(subscriber.value()))
            .filter(subscriptions::Column::AuthorId.is_in(author_ids.iter().copied()))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|row| row.author_id).collect())
    }

    /// One page of the authors a user follows, ordered by id, plus the total.
    pub async fn authors(
        &self,
        subscriber: UserId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<users::Model>, u64)> {
        let followed = Query::select()
            .column((subscriptions::Entity, subscriptions::Column::AuthorId))
            .from(subscriptions::Entity)
            .and_where(subscriptions::Column::SubscriberId.eq(subscriber.value()))
            .to_owned();

        let query = Users::find().filter(users::Column::Id.in_subquery(followed));
        let total = query.clone().count(&self.conn).await?;
        let authors = query
            .order_by_asc(users::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list subscriptions")?;

        Ok((authors, total))
    }
}
