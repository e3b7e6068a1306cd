//! `SeaORM` implementation of the `RecipeService` trait.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RecipesConfig;
use crate::db::{
    IngredientAmount, MembershipFilter, NewRecipe, RecipeFilter, RecipePatch, RecipeRecord, Store,
};
use crate::domain::shopping_list::{ShoppingList, aggregate};
use crate::domain::short_link::{ShortLinkGenerator, is_plausible_code};
use crate::domain::{IngredientId, RecipeCollection, RecipeId, TagId, UserId};
use crate::entities::{recipes, users};
use crate::services::Paged;
use crate::services::image::{ImageKind, ImageService};
use crate::services::recipe_service::{
    IngredientInput, RecipeChanges, RecipeDraft, RecipeError, RecipeQuery, RecipeService,
    RecipeView,
};

const MAX_NAME_LENGTH: usize = 256;

pub struct SeaOrmRecipeService {
    store: Store,
    images: Arc<ImageService>,
    links: Arc<ShortLinkGenerator>,
    config: RecipesConfig,
}

impl SeaOrmRecipeService {
    #[must_use]
    pub const fn new(
        store: Store,
        images: Arc<ImageService>,
        links: Arc<ShortLinkGenerator>,
        config: RecipesConfig,
    ) -> Self {
        Self {
            store,
            images,
            links,
            config,
        }
    }

    fn check_name(name: &str) -> Result<(), RecipeError> {
        if name.trim().is_empty() {
            return Err(RecipeError::Validation(
                "Recipe name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(RecipeError::Validation(format!(
                "Recipe name must be {MAX_NAME_LENGTH} characters or less"
            )));
        }
        Ok(())
    }

    fn check_text(text: &str) -> Result<(), RecipeError> {
        if text.trim().is_empty() {
            return Err(RecipeError::Validation(
                "Recipe text cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn check_cooking_time(&self, minutes: i32) -> Result<(), RecipeError> {
        let (min, max) = (self.config.min_cooking_time, self.config.max_cooking_time);
        if !(min..=max).contains(&minutes) {
            return Err(RecipeError::Validation(format!(
                "Cooking time must be between {min} and {max} minutes"
            )));
        }
        Ok(())
    }

    async fn check_tags(&self, tags: &[i32]) -> Result<Vec<TagId>, RecipeError> {
        if tags.is_empty() {
            return Err(RecipeError::Validation(
                "At least one tag is required".to_string(),
            ));
        }

        let unique: HashSet<i32> = tags.iter().copied().collect();
        if unique.len() != tags.len() {
            return Err(RecipeError::Validation(
                "Tags must not repeat".to_string(),
            ));
        }

        let found = self.store.get_tags(tags).await?;
        if found.len() != tags.len() {
            let known: HashSet<i32> = found.iter().map(|t| t.id).collect();
            let missing = tags.iter().find(|id| !known.contains(id)).copied();
            return Err(RecipeError::Validation(format!(
                "Unknown tag id: {}",
                missing.unwrap_or_default()
            )));
        }

        Ok(tags.iter().copied().map(TagId::new).collect())
    }

    async fn check_ingredients(
        &self,
        ingredients: &[IngredientInput],
    ) -> Result<Vec<IngredientAmount>, RecipeError> {
        if ingredients.is_empty() {
            return Err(RecipeError::Validation(
                "At least one ingredient is required".to_string(),
            ));
        }

        let (min, max) = (
            self.config.min_ingredient_amount,
            self.config.max_ingredient_amount,
        );
        if let Some(bad) = ingredients
            .iter()
            .find(|item| !(min..=max).contains(&item.amount))
        {
            return Err(RecipeError::Validation(format!(
                "Ingredient amount must be between {min} and {max}, got {}",
                bad.amount
            )));
        }

        let ids: Vec<i32> = ingredients.iter().map(|item| item.id).collect();
        let unique: HashSet<i32> = ids.iter().copied().collect();
        if unique.len() != ids.len() {
            return Err(RecipeError::Validation(
                "Ingredients must not repeat".to_string(),
            ));
        }

        let found = self.store.get_ingredients(&ids).await?;
        if found.len() != ids.len() {
            let known: HashSet<i32> = found.iter().map(|i| i.id).collect();
            let missing = ids.iter().find(|id| !known.contains(id)).copied();
            return Err(RecipeError::Validation(format!(
                "Unknown ingredient id: {}",
                missing.unwrap_or_default()
            )));
        }

        Ok(ingredients
            .iter()
            .map(|item| IngredientAmount {
                ingredient_id: IngredientId::new(item.id),
                amount: item.amount,
            })
            .collect())
    }

    async fn require_recipe(&self, id: RecipeId) -> Result<recipes::Model, RecipeError> {
        self.store
            .get_recipe(id)
            .await?
            .ok_or(RecipeError::NotFound)
    }

    async fn require_owned(
        &self,
        actor: &users::Model,
        id: RecipeId,
    ) -> Result<recipes::Model, RecipeError> {
        let recipe = self.require_recipe(id).await?;
        if recipe.author_id != actor.id && !actor.is_staff {
            warn!(recipe_id = %id, user_id = actor.id, "Rejected change to foreign recipe");
            return Err(RecipeError::Forbidden);
        }
        Ok(recipe)
    }

    async fn views(
        &self,
        viewer: Option<UserId>,
        records: Vec<RecipeRecord>,
    ) -> Result<Vec<RecipeView>, RecipeError> {
        let (favorites, cart, followed) = match viewer {
            Some(viewer) => {
                let recipe_ids: Vec<i32> = records.iter().map(|r| r.recipe.id).collect();
                let author_ids: Vec<i32> = records.iter().map(|r| r.author.id).collect();
                (
                    self.store
                        .collection_members(RecipeCollection::Favorites, viewer, &recipe_ids)
                        .await?,
                    self.store
                        .collection_members(RecipeCollection::ShoppingCart, viewer, &recipe_ids)
                        .await?,
                    self.store.followed_among(viewer, &author_ids).await?,
                )
            }
            None => Default::default(),
        };

        Ok(records
            .into_iter()
            .map(|record| RecipeView {
                is_favorited: favorites.contains(&record.recipe.id),
                is_in_shopping_cart: cart.contains(&record.recipe.id),
                author_subscribed: followed.contains(&record.author.id),
                record,
            })
            .collect())
    }

    async fn view(
        &self,
        viewer: Option<UserId>,
        recipe: recipes::Model,
    ) -> Result<RecipeView, RecipeError> {
        let records = self.store.load_recipe_records(vec![recipe]).await?;
        self.views(viewer, records)
            .await?
            .pop()
            .ok_or(RecipeError::NotFound)
    }
}

#[async_trait]
impl RecipeService for SeaOrmRecipeService {
    async fn list(
        &self,
        viewer: Option<UserId>,
        query: RecipeQuery,
    ) -> Result<Paged<RecipeView>, RecipeError> {
        let filter = RecipeFilter {
            author: query.author,
            tags: query.tags,
            favorites: membership(viewer, query.is_favorited),
            shopping_cart: membership(viewer, query.is_in_shopping_cart),
        };

        let (recipes, total) = self
            .store
            .list_recipes(&filter, query.offset, query.limit)
            .await?;
        let records = self.store.load_recipe_records(recipes).await?;
        let items = self.views(viewer, records).await?;

        Ok(Paged { items, total })
    }

    async fn get(&self, viewer: Option<UserId>, id: RecipeId) -> Result<RecipeView, RecipeError> {
        let recipe = self.require_recipe(id).await?;
        self.view(viewer, recipe).await
    }

    async fn create(
        &self,
        author: &users::Model,
        draft: RecipeDraft,
    ) -> Result<RecipeView, RecipeError> {
        Self::check_name(&draft.name)?;
        Self::check_text(&draft.text)?;
        self.check_cooking_time(draft.cooking_time)?;
        let tags = self.check_tags(&draft.tags).await?;
        let ingredients = self.check_ingredients(&draft.ingredients).await?;

        let image = self.images.save(&draft.image, ImageKind::Recipe).await?;

        let new_recipe = NewRecipe {
            author_id: UserId::new(author.id),
            name: draft.name.trim().to_string(),
            text: draft.text,
            cooking_time: draft.cooking_time,
            image: image.clone(),
            tags,
            ingredients,
        };

        let recipe = match self.store.create_recipe(new_recipe, &self.links).await {
            Ok(recipe) => recipe,
            Err(e) => {
                self.images.remove(&image).await;
                return Err(e.into());
            }
        };

        info!(
            recipe_id = recipe.id,
            author_id = author.id,
            short_link = recipe.short_link.as_deref().unwrap_or_default(),
            "Recipe created"
        );

        self.view(Some(UserId::new(author.id)), recipe).await
    }

    async fn update(
        &self,
        actor: &users::Model,
        id: RecipeId,
        changes: RecipeChanges,
    ) -> Result<RecipeView, RecipeError> {
        let existing = self.require_owned(actor, id).await?;

        let tags = changes
            .tags
            .ok_or_else(|| RecipeError::Validation("Field 'tags' is required".to_string()))?;
        let ingredients = changes.ingredients.ok_or_else(|| {
            RecipeError::Validation("Field 'ingredients' is required".to_string())
        })?;

        if let Some(name) = &changes.name {
            Self::check_name(name)?;
        }
        if let Some(text) = &changes.text {
            Self::check_text(text)?;
        }
        if let Some(minutes) = changes.cooking_time {
            self.check_cooking_time(minutes)?;
        }
        let tags = self.check_tags(&tags).await?;
        let ingredients = self.check_ingredients(&ingredients).await?;

        let new_image = match &changes.image {
            Some(data_url) => Some(self.images.save(data_url, ImageKind::Recipe).await?),
            None => None,
        };

        let patch = RecipePatch {
            name: changes.name.map(|n| n.trim().to_string()),
            text: changes.text,
            cooking_time: changes.cooking_time,
            image: new_image.clone(),
        };

        let updated = match self.store.update_recipe(id, patch, &tags, &ingredients).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                if let Some(image) = &new_image {
                    self.images.remove(image).await;
                }
                return Err(RecipeError::NotFound);
            }
            Err(e) => {
                if let Some(image) = &new_image {
                    self.images.remove(image).await;
                }
                return Err(e.into());
            }
        };

        if new_image.is_some() {
            self.images.remove(&existing.image).await;
        }

        info!(recipe_id = %id, user_id = actor.id, "Recipe updated");
        self.view(Some(UserId::new(actor.id)), updated).await
    }

    async fn delete(&self, actor: &users::Model, id: RecipeId) -> Result<(), RecipeError> {
        self.require_owned(actor, id).await?;

        let removed = self
            .store
            .delete_recipe(id)
            .await?
            .ok_or(RecipeError::NotFound)?;
        self.images.remove(&removed.image).await;

        info!(recipe_id = %id, user_id = actor.id, "Recipe deleted");
        Ok(())
    }

    async fn short_link(&self, id: RecipeId) -> Result<String, RecipeError> {
        self.store
            .ensure_short_link(id, &self.links)
            .await?
            .ok_or(RecipeError::NotFound)
    }

    async fn resolve_short_link(&self, code: &str) -> Result<RecipeId, RecipeError> {
        if !is_plausible_code(code) {
            return Err(RecipeError::NotFound);
        }

        self.store
            .get_recipe_by_short_link(code)
            .await?
            .map(|recipe| RecipeId::new(recipe.id))
            .ok_or(RecipeError::NotFound)
    }

    async fn add_to(
        &self,
        collection: RecipeCollection,
        user: UserId,
        id: RecipeId,
    ) -> Result<recipes::Model, RecipeError> {
        let recipe = self.require_recipe(id).await?;

        if !self.store.add_to_collection(collection, user, id).await? {
            return Err(RecipeError::Validation(
                collection.already_present_message().to_string(),
            ));
        }

        Ok(recipe)
    }

    async fn remove_from(
        &self,
        collection: RecipeCollection,
        user: UserId,
        id: RecipeId,
    ) -> Result<(), RecipeError> {
        self.require_recipe(id).await?;

        if !self
            .store
            .remove_from_collection(collection, user, id)
            .await?
        {
            return Err(RecipeError::Validation(
                collection.missing_message().to_string(),
            ));
        }

        Ok(())
    }

    async fn shopping_list(&self, user: UserId) -> Result<ShoppingList, RecipeError> {
        let lines = self.store.cart_lines(user).await?;
        Ok(aggregate(lines))
    }
}

/// Collection filters only apply to a signed-in viewer.
fn membership(viewer: Option<UserId>, flag: Option<bool>) -> Option<MembershipFilter> {
    Some(MembershipFilter {
        user: viewer?,
        member: flag?,
    })
}
