//! Domain types for recipe management with strong typing.
//!
//! Identifiers are newtypes so a recipe id can never be passed where a user
//! or ingredient id is expected. The two pieces of non-CRUD logic live in
//! [`short_link`] and [`shopping_list`].

pub mod shopping_list;
pub mod short_link;

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }
    };
}

entity_id!(
    /// Primary key of a row in `recipes`.
    RecipeId
);
entity_id!(
    /// Primary key of a row in `users`.
    UserId
);
entity_id!(
    /// Primary key of a row in `ingredients`.
    IngredientId
);
entity_id!(
    /// Primary key of a row in `tags`.
    TagId
);

/// Toggleable per-user recipe collections. Both are sets keyed by
/// `(user_id, recipe_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCollection {
    Favorites,
    ShoppingCart,
}

impl RecipeCollection {
    #[must_use]
    pub const fn already_present_message(&self) -> &'static str {
        match self {
            Self::Favorites => "Recipe is already in favorites",
            Self::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    #[must_use]
    pub const fn missing_message(&self) -> &'static str {
        match self {
            Self::Favorites => "Recipe is not in favorites",
            Self::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_id_conversions() {
        let id = RecipeId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i32::from(id), 42);
        assert_eq!(RecipeId::from(42), id);
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&UserId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: IngredientId = serde_json::from_str("13").unwrap();
        assert_eq!(back, IngredientId::new(13));
    }
}
