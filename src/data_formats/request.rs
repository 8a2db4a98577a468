use serde::{Deserialize, Serialize};

use crate::{
    errors::RequestError,
    models::{IngredientEntry, NewRecipe, RecipeChanges, RecipeFilters},
};

use super::PageParams;

// ----------------- User Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct SubscriptionQueryParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub recipes_limit: Option<i64>,
}

impl SubscriptionQueryParams {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ----------------- Reference Data Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct IngredientQueryParams {
    #[serde(default)]
    pub name: Option<String>,
}

// ----------------- Recipe Request -----------------
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct IngredientAmountRequest {
    pub id: i64,
    pub amount: i64,
}

impl From<IngredientAmountRequest> for IngredientEntry {
    fn from(IngredientAmountRequest { id, amount }: IngredientAmountRequest) -> Self {
        IngredientEntry { id, amount }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmountRequest>,
    pub tags: Vec<i64>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

impl CreateRecipeRequest {
    /// `image` is the stored reference, not the submitted payload.
    pub fn into_new_recipe(self, image: Option<String>) -> NewRecipe {
        NewRecipe {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image,
            tags: self.tags,
            ingredients: self.ingredients.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct UpdateRecipeRequest {
    pub ingredients: Vec<IngredientAmountRequest>,
    pub tags: Vec<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
}

impl UpdateRecipeRequest {
    pub fn into_changes(self, image: Option<String>) -> RecipeChanges {
        RecipeChanges {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image,
            tags: self.tags,
            ingredients: self.ingredients.into_iter().map(Into::into).collect(),
        }
    }
}

/// `/recipes/` query string. `tags` may repeat, so it is read from raw pairs.
#[derive(Debug, Default)]
pub struct RecipeQueryParams {
    pub page: PageParams,
    pub filters: RecipeFilters,
}

fn parse_integer(key: &str, value: &str) -> Result<i64, RequestError> {
    value
        .parse()
        .map_err(|_| RequestError::validation(format!("{key} must be an integer")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, RequestError> {
    match value {
        "1" | "true" | "True" => Ok(true),
        "0" | "false" | "False" => Ok(false),
        _ => Err(RequestError::validation(format!("{key} must be 0 or 1"))),
    }
}

impl RecipeQueryParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, RequestError> {
        let mut params = RecipeQueryParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => params.page.page = Some(parse_integer(&key, &value)?),
                "limit" => params.page.limit = Some(parse_integer(&key, &value)?),
                "author" => params.filters.author = Some(parse_integer(&key, &value)?),
                "tags" => params.filters.tags.push(value),
                "is_favorited" => params.filters.is_favorited = parse_flag(&key, &value)?,
                "is_in_shopping_cart" => {
                    params.filters.is_in_shopping_cart = parse_flag(&key, &value)?
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_tags_are_collected() {
        let params = RecipeQueryParams::from_pairs(pairs(&[
            ("tags", "lunch"),
            ("tags", "dinner"),
            ("is_favorited", "1"),
            ("author", "7"),
            ("page", "2"),
            ("unknown", "x"),
        ]))
        .unwrap();
        assert_eq!(params.filters.tags, ["lunch", "dinner"]);
        assert!(params.filters.is_favorited);
        assert!(!params.filters.is_in_shopping_cart);
        assert_eq!(params.filters.author, Some(7));
        assert_eq!(params.page.page, Some(2));
    }

    #[test]
    fn malformed_values_are_validation_errors() {
        assert!(matches!(
            RecipeQueryParams::from_pairs(pairs(&[("author", "anna")])),
            Err(RequestError::Validation(_))
        ));
        assert!(matches!(
            RecipeQueryParams::from_pairs(pairs(&[("is_in_shopping_cart", "yes")])),
            Err(RequestError::Validation(_))
        ));
    }

    #[test]
    fn recipe_payload_deserializes() {
        let request: CreateRecipeRequest = serde_json::from_value(serde_json::json!({
            "ingredients": [{"id": 1, "amount": 10}],
            "tags": [1, 2],
            "name": "Soup",
            "text": "Boil",
            "cooking_time": 5
        }))
        .unwrap();
        let recipe = request.into_new_recipe(None);
        assert_eq!(recipe.ingredients, vec![IngredientEntry { id: 1, amount: 10 }]);
        assert_eq!(recipe.tags, vec![1, 2]);
        assert!(recipe.image.is_none());
    }
}
