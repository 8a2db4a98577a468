use serde::{Deserialize, Serialize};

use crate::{
    db_helpers::Subscription,
    models::{Ingredient, Profile, RecipeIngredient, RecipeSummary, Tag, User},
};

// ----------------- User Response -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: i64,
}

impl From<User> for CreatedUserResponse {
    fn from(
        User {
            email,
            id,
            username,
            first_name,
            last_name,
            ..
        }: User,
    ) -> Self {
        CreatedUserResponse {
            email,
            id,
            username,
            first_name,
            last_name,
        }
    }
}

impl From<Profile> for UserResponse {
    fn from(
        Profile {
            id,
            email,
            username,
            first_name,
            last_name,
            is_subscribed,
        }: Profile,
    ) -> Self {
        UserResponse {
            email,
            id,
            username,
            first_name,
            last_name,
            is_subscribed,
        }
    }
}

impl From<Subscription> for SubscriptionResponse {
    fn from(Subscription { author, recipes }: Subscription) -> Self {
        SubscriptionResponse {
            email: author.email,
            id: author.id,
            username: author.username,
            first_name: author.first_name,
            last_name: author.last_name,
            is_subscribed: true,
            recipes: recipes.into_iter().map(Into::into).collect(),
            recipes_count: author.recipes_count,
        }
    }
}

// ----------------- Reference Data Response -----------------
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct IngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl From<Tag> for TagResponse {
    fn from(Tag { id, name, color, slug }: Tag) -> Self {
        TagResponse {
            id,
            name,
            color,
            slug,
        }
    }
}

impl From<Ingredient> for IngredientResponse {
    fn from(
        Ingredient {
            id,
            name,
            measurement_unit,
        }: Ingredient,
    ) -> Self {
        IngredientResponse {
            id,
            name,
            measurement_unit,
        }
    }
}

// ----------------- Recipe Response -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct RecipeShortResponse {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i64,
}

impl From<RecipeIngredient> for RecipeIngredientResponse {
    fn from(
        RecipeIngredient {
            id,
            name,
            measurement_unit,
            amount,
        }: RecipeIngredient,
    ) -> Self {
        RecipeIngredientResponse {
            id,
            name,
            measurement_unit,
            amount,
        }
    }
}

impl From<RecipeSummary> for RecipeShortResponse {
    fn from(
        RecipeSummary {
            id,
            name,
            image,
            cooking_time,
        }: RecipeSummary,
    ) -> Self {
        RecipeShortResponse {
            id,
            name,
            image,
            cooking_time,
        }
    }
}
