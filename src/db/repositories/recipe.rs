use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict, Query, SelectStatement, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
    TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::domain::shopping_list::CartLine;
use crate::domain::short_link::ShortLinkGenerator;
use crate::domain::{IngredientId, RecipeCollection, RecipeId, TagId, UserId};
use crate::entities::{
    favorites, ingredients, prelude::*, recipe_ingredients, recipe_tags, recipes, shopping_cart,
    tags, users,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub author_id: UserId,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Scalar recipe fields to change. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
}

impl RecipePatch {
    /// Merges the set fields into `active`, leaving the rest untouched.
    pub fn apply(self, active: &mut recipes::ActiveModel) {
        if let Some(name) = self.name {
            active.name = Set(name);
        }
        if let Some(text) = self.text {
            active.text = Set(text);
        }
        if let Some(cooking_time) = self.cooking_time {
            active.cooking_time = Set(cooking_time);
        }
        if let Some(image) = self.image {
            active.image = Set(image);
        }
    }
}

/// Keeps recipes that are (`member: true`) or are not (`member: false`) in
/// one user's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipFilter {
    pub user: UserId,
    pub member: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    /// Tag slugs; a recipe matches if it carries any of them.
    pub tags: Vec<String>,
    pub favorites: Option<MembershipFilter>,
    pub shopping_cart: Option<MembershipFilter>,
}

#[derive(Debug, Clone)]
pub struct RecipeIngredientRow {
    pub ingredient: ingredients::Model,
    pub amount: i32,
}

/// A recipe row together with everything the full representation shows.
#[derive(Debug, Clone)]
pub struct RecipeRecord {
    pub recipe: recipes::Model,
    pub author: users::Model,
    pub tags: Vec<tags::Model>,
    pub ingredients: Vec<RecipeIngredientRow>,
}

#[derive(Debug, FromQueryResult)]
struct AuthorRecipeCount {
    author_id: i32,
    recipes: i64,
}

pub struct RecipeRepository {
    conn: DatabaseConnection,
}

impl RecipeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: RecipeId) -> Result<Option<recipes::Model>> {
        Recipes::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query recipe")
    }

    pub async fn get_by_short_link(&self, code: &str) -> Result<Option<recipes::Model>> {
        Recipes::find()
            .filter(recipes::Column::ShortLink.eq(code))
            .one(&self.conn)
            .await
            .context("Failed to query recipe by short link")
    }

    /// Inserts the recipe with a fresh short link and its tag and ingredient
    /// rows in one transaction.
    pub async fn create(
        &self,
        recipe: NewRecipe,
        links: &ShortLinkGenerator,
    ) -> Result<recipes::Model> {
        let txn = self.conn.begin().await?;

        let created_at = now();
        let mut code = draw_short_link(&txn, links).await?;
        let mut retried = false;

        let model = loop {
            let active = recipes::ActiveModel {
                author_id: Set(recipe.author_id.value()),
                name: Set(recipe.name.clone()),
                text: Set(recipe.text.clone()),
                cooking_time: Set(recipe.cooking_time),
                image: Set(recipe.image.clone()),
                created_at: Set(created_at.clone()),
                short_link: Set(Some(code.clone())),
                ..Default::default()
            };

            match active.insert(&txn).await {
                Ok(model) => break model,
                Err(e) if !retried && is_short_link_collision(&e) => {
                    warn!(code = %code, "Short link taken during insert, drawing a new one");
                    retried = true;
                    code = draw_short_link(&txn, links).await?;
                }
                Err(e) => return Err(e).context("Failed to insert recipe"),
            }
        };

        replace_tags(&txn, model.id, &recipe.tags).await?;
        replace_ingredients(&txn, model.id, &recipe.ingredients).await?;

        txn.commit().await?;
        metrics::counter!("short_links_generated_total").increment(1);
        debug!(recipe_id = model.id, short_link = %code, "Recipe created");

        Ok(model)
    }

    /// Applies `patch` and fully replaces tag and ingredient rows.
    /// Returns `None` if the recipe does not exist.
    pub async fn update(
        &self,
        id: RecipeId,
        patch: RecipePatch,
        tag_ids: &[TagId],
        ingredients: &[IngredientAmount],
    ) -> Result<Option<recipes::Model>> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Recipes::find_by_id(id.value()).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: recipes::ActiveModel = existing.clone().into();
        patch.apply(&mut active);
        let updated = if active.is_changed() {
            active
                .update(&txn)
                .await
                .context("Failed to update recipe")?
        } else {
            existing
        };

        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        replace_tags(&txn, id.value(), tag_ids).await?;

        RecipeIngredients::delete_many()
            .filter(recipe_ingredients::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        replace_ingredients(&txn, id.value(), ingredients).await?;

        txn.commit().await?;
        Ok(Some(updated))
    }

    /// Deletes the recipe and every row pointing at it. Returns the removed
    /// row so the caller can clean up its image.
    pub async fn delete(&self, id: RecipeId) -> Result<Option<recipes::Model>> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Recipes::find_by_id(id.value()).one(&txn).await? else {
            return Ok(None);
        };

        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        RecipeIngredients::delete_many()
            .filter(recipe_ingredients::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        Favorites::delete_many()
            .filter(favorites::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        ShoppingCart::delete_many()
            .filter(shopping_cart::Column::RecipeId.eq(id.value()))
            .exec(&txn)
            .await?;
        Recipes::delete_by_id(id.value()).exec(&txn).await?;

        txn.commit().await?;
        Ok(Some(existing))
    }

    /// Returns the recipe's short link, assigning one first if the row has
    /// none. Concurrent callers all observe the code that was stored first.
    pub async fn ensure_short_link(
        &self,
        id: RecipeId,
        links: &ShortLinkGenerator,
    ) -> Result<Option<String>> {
        let Some(recipe) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(code) = recipe.short_link {
            return Ok(Some(code));
        }

        let mut retried = false;
        loop {
            let code = draw_short_link(&self.conn, links).await?;
            let result = Recipes::update_many()
                .col_expr(recipes::Column::ShortLink, Expr::value(code.clone()))
                .filter(recipes::Column::Id.eq(id.value()))
                .filter(recipes::Column::ShortLink.is_null())
                .exec(&self.conn)
                .await;

            match result {
                Ok(res) => {
                    if res.rows_affected > 0 {
                        metrics::counter!("short_links_generated_total").increment(1);
                        debug!(recipe_id = %id, short_link = %code, "Short link assigned");
                    }
                    break;
                }
                Err(e) if !retried && is_short_link_collision(&e) => {
                    warn!(code = %code, "Short link taken during update, drawing a new one");
                    retried = true;
                }
                Err(e) => return Err(e).context("Failed to store short link"),
            }
        }

        Ok(self.get(id).await?.and_then(|r| r.short_link))
    }

    /// One page of recipes matching `filter`, newest first, plus the total
    /// number of matches.
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<recipes::Model>, u64)> {
        let query = filtered(filter);
        let total = query.clone().count(&self.conn).await?;

        let recipes = query
            .order_by_desc(recipes::Column::CreatedAt)
            .order_by_desc(recipes::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list recipes")?;

        Ok((recipes, total))
    }

    /// Newest recipes of one author, optionally capped.
    pub async fn by_author(
        &self,
        author: UserId,
        limit: Option<u64>,
    ) -> Result<Vec<recipes::Model>> {
        let mut query = Recipes::find()
            .filter(recipes::Column::AuthorId.eq(author.value()))
            .order_by_desc(recipes::Column::CreatedAt)
            .order_by_desc(recipes::Column::Id);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list recipes by author")
    }

    pub async fn count_by_authors(&self, author_ids: &[i32]) -> Result<HashMap<i32, u64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Recipes::find()
            .select_only()
            .column(recipes::Column::AuthorId)
            .column_as(Expr::col(recipes::Column::Id).count(), "recipes")
            .filter(recipes::Column::AuthorId.is_in(author_ids.iter().copied()))
            .group_by(recipes::Column::AuthorId)
            .into_model::<AuthorRecipeCount>()
            .all(&self.conn)
            .await
            .context("Failed to count recipes by author")?;

        Ok(rows
            .into_iter()
            .map(|r| (r.author_id, u64::try_from(r.recipes).unwrap_or(0)))
            .collect())
    }

    /// Loads authors, tags and ingredients for `recipes`, preserving order.
    pub async fn load_records(&self, recipes: Vec<recipes::Model>) -> Result<Vec<RecipeRecord>> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
        let author_ids: Vec<i32> = recipes
            .iter()
            .map(|r| r.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let authors: HashMap<i32, users::Model> = Users::find()
            .filter(users::Column::Id.is_in(author_ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut tags_by_recipe: HashMap<i32, Vec<tags::Model>> = HashMap::new();
        let tag_rows = RecipeTags::find()
            .find_also_related(Tags)
            .filter(recipe_tags::Column::RecipeId.is_in(recipe_ids.clone()))
            .order_by_asc(recipe_tags::Column::TagId)
            .all(&self.conn)
            .await?;
        for (link, tag) in tag_rows {
            if let Some(tag) = tag {
                tags_by_recipe.entry(link.recipe_id).or_default().push(tag);
            }
        }

        let mut ingredients_by_recipe: HashMap<i32, Vec<RecipeIngredientRow>> = HashMap::new();
        let ingredient_rows = RecipeIngredients::find()
            .find_also_related(Ingredients)
            .filter(recipe_ingredients::Column::RecipeId.is_in(recipe_ids))
            .order_by_asc(recipe_ingredients::Column::Id)
            .all(&self.conn)
            .await?;
        for (row, ingredient) in ingredient_rows {
            if let Some(ingredient) = ingredient {
                ingredients_by_recipe
                    .entry(row.recipe_id)
                    .or_default()
                    .push(RecipeIngredientRow {
                        ingredient,
                        amount: row.amount,
                    });
            }
        }

        let mut records = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            let Some(author) = authors.get(&recipe.author_id).cloned() else {
                warn!(recipe_id = recipe.id, "Recipe author missing, skipping");
                continue;
            };

            records.push(RecipeRecord {
                tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients_by_recipe.remove(&recipe.id).unwrap_or_default(),
                author,
                recipe,
            });
        }

        Ok(records)
    }

    /// Adds the recipe to the user's collection. Returns `false` if it was
    /// already there.
    pub async fn add_to_collection(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe: RecipeId,
    ) -> Result<bool> {
        let inserted = match collection {
            RecipeCollection::Favorites => {
                Favorites::insert(favorites::ActiveModel {
                    user_id: Set(user.value()),
                    recipe_id: Set(recipe.value()),
                })
                .on_conflict(
                    OnConflict::columns([favorites::Column::UserId, favorites::Column::RecipeId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.conn)
                .await?
            }
            RecipeCollection::ShoppingCart => {
                ShoppingCart::insert(shopping_cart::ActiveModel {
                    user_id: Set(user.value()),
                    recipe_id: Set(recipe.value()),
                })
                .on_conflict(
                    OnConflict::columns([
                        shopping_cart::Column::UserId,
                        shopping_cart::Column::RecipeId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.conn)
                .await?
            }
        };

        Ok(inserted > 0)
    }

    /// Returns `false` if the recipe was not in the collection.
    pub async fn remove_from_collection(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe: RecipeId,
    ) -> Result<bool> {
        let removed = match collection {
            RecipeCollection::Favorites => {
                Favorites::delete_many()
                    .filter(favorites::Column::UserId.eq(user.value()))
                    .filter(favorites::Column::RecipeId.eq(recipe.value()))
                    .exec(&self.conn)
                    .await?
            }
            RecipeCollection::ShoppingCart => {
                ShoppingCart::delete_many()
                    .filter(shopping_cart::Column::UserId.eq(user.value()))
                    .filter(shopping_cart::Column::RecipeId.eq(recipe.value()))
                    .exec(&self.conn)
                    .await?
            }
        };

        Ok(removed.rows_affected > 0)
    }

    /// The subset of `recipe_ids` present in the user's collection.
    pub async fn collection_members(
        &self,
        collection: RecipeCollection,
        user: UserId,
        recipe_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = match collection {
            RecipeCollection::Favorites => Favorites::find()
                .filter(favorites::Column::UserId.eq(user.value()))
                .filter(favorites::Column::RecipeId.is_in(recipe_ids.iter().copied()))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect(),
            RecipeCollection::ShoppingCart => ShoppingCart::find()
                .filter(shopping_cart::Column::UserId.eq(user.value()))
                .filter(shopping_cart::Column::RecipeId.is_in(recipe_ids.iter().copied()))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect(),
        };

        Ok(ids)
    }

    /// Every `(ingredient, amount)` pair of every recipe in the user's cart.
    pub async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>> {
        let rows = RecipeIngredients::find()
            .find_also_related(Ingredients)
            .filter(
                recipe_ingredients::Column::RecipeId
                    .in_subquery(collection_subquery(RecipeCollection::ShoppingCart, user)),
            )
            .all(&self.conn)
            .await
            .context("Failed to load shopping cart lines")?;

        Ok(rows
            .into_iter()
            .filter_map(|(row, ingredient)| {
                ingredient.map(|ingredient| CartLine {
                    ingredient_id: IngredientId::new(ingredient.id),
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: row.amount,
                })
            })
            .collect())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn is_short_link_collision(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("short_link")
    )
}

async fn short_link_taken<C: ConnectionTrait>(conn: &C, code: &str) -> Result<bool> {
    let count = Recipes::find()
        .filter(recipes::Column::ShortLink.eq(code))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn draw_short_link<C: ConnectionTrait>(
    conn: &C,
    links: &ShortLinkGenerator,
) -> Result<String> {
    let code = links
        .generate(|candidate| async move { short_link_taken(conn, &candidate).await })
        .await?;
    Ok(code)
}

async fn replace_tags<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    tag_ids: &[TagId],
) -> Result<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let rows = tag_ids.iter().map(|tag| recipe_tags::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(tag.value()),
    });
    RecipeTags::insert_many(rows)
        .exec_without_returning(conn)
        .await
        .context("Failed to insert recipe tags")?;
    Ok(())
}

async fn replace_ingredients<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    ingredients: &[IngredientAmount],
) -> Result<()> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let rows = ingredients
        .iter()
        .map(|item| recipe_ingredients::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(item.ingredient_id.value()),
            amount: Set(item.amount),
            ..Default::default()
        });
    RecipeIngredients::insert_many(rows)
        .exec_without_returning(conn)
        .await
        .context("Failed to insert recipe ingredients")?;
    Ok(())
}

fn collection_subquery(collection: RecipeCollection, user: UserId) -> SelectStatement {
    match collection {
        RecipeCollection::Favorites => Query::select()
            .column((favorites::Entity, favorites::Column::RecipeId))
            .from(favorites::Entity)
            .and_where(favorites::Column::UserId.eq(user.value()))
            .to_owned(),
        RecipeCollection::ShoppingCart => Query::select()
            .column((shopping_cart::Entity, shopping_cart::Column::RecipeId))
            .from(shopping_cart::Entity)
            .and_where(shopping_cart::Column::UserId.eq(user.value()))
            .to_owned(),
    }
}

fn filtered(filter: &RecipeFilter) -> Select<recipes::Entity> {
    let mut query = Recipes::find();

    if let Some(author) = filter.author {
        query = query.filter(recipes::Column::AuthorId.eq(author.value()));
    }

    if !filter.tags.is_empty() {
        let tagged = Query::select()
            .column((recipe_tags::Entity, recipe_tags::Column::RecipeId))
            .from(recipe_tags::Entity)
            .inner_join(
                tags::Entity,
                Expr::col((tags::Entity, tags::Column::Id))
                    .equals((recipe_tags::Entity, recipe_tags::Column::TagId)),
            )
            .and_where(tags::Column::Slug.is_in(filter.tags.iter().cloned()))
            .to_owned();
        query = query.filter(recipes::Column::Id.in_subquery(tagged));
    }

    if let Some(membership) = filter.favorites {
        query = query.filter(membership_condition(RecipeCollection::Favorites, membership));
    }

    if let Some(membership) = filter.shopping_cart {
        query = query.filter(membership_condition(RecipeCollection::ShoppingCart, membership));
    }

    query
}

fn membership_condition(
    collection: RecipeCollection,
    membership: MembershipFilter,
) -> SimpleExpr {
    let members = collection_subquery(collection, membership.user);
    if membership.member {
        recipes::Column::Id.in_subquery(members)
    } else {
        recipes::Column::Id.not_in_subquery(members)
    }
}
