use sqlx::SqlitePool;
use tracing::info;

use crate::{errors::RequestError, models::RecipeSummary};

use super::get_recipe_summary_in_db;

/// A per-user set of recipes stored as a `(user_id, recipe_id)` table with a unique pair.
pub trait RecipeCollection {
    const TABLE: &'static str;
    const ALREADY_ADDED: &'static str;
    const NOT_IN_COLLECTION: &'static str;
}

pub struct Favorites;

impl RecipeCollection for Favorites {
    const TABLE: &'static str = "favorites";
    const ALREADY_ADDED: &'static str = "Recipe is already in favorites";
    const NOT_IN_COLLECTION: &'static str = "Recipe is not in favorites";
}

pub struct ShoppingCart;

impl RecipeCollection for ShoppingCart {
    const TABLE: &'static str = "shopping_carts";
    const ALREADY_ADDED: &'static str = "Recipe is already in the shopping cart";
    const NOT_IN_COLLECTION: &'static str = "Recipe is not in the shopping cart";
}

/// The insert is left to the unique constraint, so a concurrent duplicate surfaces as a conflict.
pub async fn add_to_collection<C: RecipeCollection>(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
) -> Result<RecipeSummary, RequestError> {
    let recipe = get_recipe_summary_in_db(pool, recipe_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES (?, ?)",
        C::TABLE
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(&mut tx)
    .await
    .map_err(|e| RequestError::from(e).on_unique_violation(RequestError::Conflict(C::ALREADY_ADDED)))?;
    tx.commit().await?;

    info!(user_id, recipe_id, collection = C::TABLE, "added recipe");
    Ok(recipe)
}

pub async fn remove_from_collection<C: RecipeCollection>(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
) -> Result<(), RequestError> {
    get_recipe_summary_in_db(pool, recipe_id).await?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = ? AND recipe_id = ?",
        C::TABLE
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(&mut tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound(C::NOT_IN_COLLECTION));
    }
    tx.commit().await?;

    info!(user_id, recipe_id, collection = C::TABLE, "removed recipe");
    Ok(())
}
