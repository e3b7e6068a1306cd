//! Shopping-cart aggregation and rendering.
//!
//! Lines from every recipe in a cart are grouped by ingredient id and their
//! amounts summed. Grouping by id keeps "Sugar (g)" and "Sugar (tbsp)" apart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::str::FromStr;

use super::IngredientId;

/// One `(ingredient, amount)` pair of one recipe in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingList {
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn get(&self, id: IngredientId) -> Option<&ShoppingListItem> {
        self.items.iter().find(|item| item.ingredient_id == id)
    }
}

/// Sums amounts per ingredient and sorts the result by name, unit, then id.
pub fn aggregate<I>(lines: I) -> ShoppingList
where
    I: IntoIterator<Item = CartLine>,
{
    let mut totals: HashMap<IngredientId, ShoppingListItem> = HashMap::new();

    for line in lines {
        totals
            .entry(line.ingredient_id)
            .and_modify(|item| item.total_amount += i64::from(line.amount))
            .or_insert_with(|| ShoppingListItem {
                ingredient_id: line.ingredient_id,
                name: line.name,
                measurement_unit: line.measurement_unit,
                total_amount: i64::from(line.amount),
            });
    }

    let mut items: Vec<ShoppingListItem> = totals.into_values().collect();
    items.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
            .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
    });

    ShoppingList { items }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoppingListFormat {
    #[default]
    Csv,
    Txt,
}

impl ShoppingListFormat {
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Txt => "text/plain; charset=utf-8",
        }
    }

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
        }
    }

    #[must_use]
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"shopping_cart.{}\"",
            self.extension()
        )
    }

    #[must_use]
    pub fn render(&self, list: &ShoppingList) -> String {
        match self {
            Self::Csv => render_csv(list),
            Self::Txt => render_text(list),
        }
    }
}

impl FromStr for ShoppingListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "txt" | "text" => Ok(Self::Txt),
            other => Err(format!("Unsupported shopping list format: {other}")),
        }
    }
}

const UTF8_BOM: char = '\u{feff}';

/// CSV with a BOM so spreadsheet tools pick up UTF-8 ingredient names.
#[must_use]
pub fn render_csv(list: &ShoppingList) -> String {
    let mut out = String::new();
    out.push(UTF8_BOM);
    out.push_str("Ingredient,Amount,Measurement Unit\r\n");

    for item in &list.items {
        let _ = write!(
            out,
            "{},{},{}\r\n",
            csv_field(&item.name),
            item.total_amount,
            csv_field(&item.measurement_unit)
        );
    }

    out
}

#[must_use]
pub fn render_text(list: &ShoppingList) -> String {
    let mut out = String::from("Shopping list\n");

    for item in &list.items {
        let _ = writeln!(
            out,
            "{} ({}): {}",
            item.name, item.measurement_unit, item.total_amount
        );
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
