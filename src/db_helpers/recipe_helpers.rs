use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::{
    errors::RequestError,
    models::{IngredientEntry, NewRecipe, Recipe, RecipeChanges, RecipeFilters, RecipeSummary},
    validation::{
        ensure_unique_ids, validate_range, validate_required, validate_text, LIMIT_RECIPE_NAME,
    },
};

use super::{replace_recipe_ingredients, replace_recipe_tags, UpdateBuilder};

/// `SELECT <recipe columns> FROM recipes`, with the favorite/cart flags computed for `viewer`.
fn push_recipe_select(builder: &mut sqlx::QueryBuilder<'_, Sqlite>, viewer: Option<i64>) {
    builder
        .push(
            "SELECT recipes.id, recipes.author_id, recipes.name, recipes.text, recipes.image,
                    recipes.cooking_time,
                    EXISTS (SELECT 1 FROM favorites
                            WHERE favorites.recipe_id = recipes.id AND favorites.user_id = ",
        )
        .push_bind(viewer)
        .push(
            ") AS is_favorited,
                    EXISTS (SELECT 1 FROM shopping_carts
                            WHERE shopping_carts.recipe_id = recipes.id AND shopping_carts.user_id = ",
        )
        .push_bind(viewer)
        .push(") AS is_in_shopping_cart FROM recipes");
}

fn validate_composition(
    tags: &[i64],
    ingredients: &[IngredientEntry],
) -> Result<(), RequestError> {
    if ingredients.is_empty() {
        return Err(RequestError::validation("A recipe needs at least one ingredient"));
    }
    ensure_unique_ids("ingredient", ingredients.iter().map(|entry| entry.id))?;
    ensure_unique_ids("tag", tags.iter().copied())?;
    for entry in ingredients {
        validate_range("amount", entry.amount)?;
    }
    Ok(())
}

/// Checks that the recipe exists and that `actor` wrote it.
async fn ensure_author(
    tx: &mut Transaction<'_, Sqlite>,
    actor: i64,
    recipe_id: i64,
) -> Result<(), RequestError> {
    let author: Option<i64> = sqlx::query_scalar("SELECT author_id FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?;
    match author {
        None => Err(RequestError::NotFound("Recipe not found")),
        Some(author) if author != actor => Err(RequestError::Forbidden),
        Some(_) => Ok(()),
    }
}

// ----------------- Composition -----------------

/// Creates a recipe with its tags and ingredient lines in one transaction and returns its id.
pub async fn create_recipe_in_db(
    pool: &SqlitePool,
    author_id: i64,
    recipe: NewRecipe,
) -> Result<i64, RequestError> {
    validate_text("name", &recipe.name, LIMIT_RECIPE_NAME)?;
    validate_required("text", &recipe.text)?;
    validate_range("cooking_time", recipe.cooking_time)?;
    validate_composition(&recipe.tags, &recipe.ingredients)?;

    let mut tx = pool.begin().await?;
    let recipe_id: i64 = sqlx::query_scalar(
        "INSERT INTO recipes (author_id, name, text, image, cooking_time)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(&recipe.image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut tx)
    .await?;

    replace_recipe_tags(&mut tx, recipe_id, &recipe.tags).await?;
    replace_recipe_ingredients(&mut tx, recipe_id, &recipe.ingredients).await?;

    tx.commit().await?;
    info!(recipe_id, author_id, "created recipe");
    Ok(recipe_id)
}

/// Replaces the tag set and ingredient lines of a recipe and updates the supplied fields.
pub async fn update_recipe_in_db(
    pool: &SqlitePool,
    actor: i64,
    recipe_id: i64,
    RecipeChanges {
        name,
        text,
        cooking_time,
        image,
        tags,
        ingredients,
    }: RecipeChanges,
) -> Result<(), RequestError> {
    if let Some(name) = &name {
        validate_text("name", name, LIMIT_RECIPE_NAME)?;
    }
    if let Some(text) = &text {
        validate_required("text", text)?;
    }
    if let Some(cooking_time) = cooking_time {
        validate_range("cooking_time", cooking_time)?;
    }
    validate_composition(&tags, &ingredients)?;

    let mut tx = pool.begin().await?;
    ensure_author(&mut tx, actor, recipe_id).await?;

    replace_recipe_tags(&mut tx, recipe_id, &tags).await?;
    replace_recipe_ingredients(&mut tx, recipe_id, &ingredients).await?;
    UpdateBuilder::new("recipes")
        .set_text("name", name)
        .set_text("text", text)
        .set_text("image", image)
        .set_integer("cooking_time", cooking_time)
        .execute(&mut tx, recipe_id)
        .await?;

    tx.commit().await?;
    info!(recipe_id, actor, "updated recipe");
    Ok(())
}

/// Deletes a recipe together with its ingredient lines, tag links, favorites and cart entries.
pub async fn delete_recipe_in_db(
    pool: &SqlitePool,
    actor: i64,
    recipe_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    ensure_author(&mut tx, actor, recipe_id).await?;

    for table in ["recipe_ingredients", "recipe_tags", "favorites", "shopping_carts"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = ?"))
            .bind(recipe_id)
            .execute(&mut tx)
            .await?;
    }
    sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;
    info!(recipe_id, actor, "deleted recipe");
    Ok(())
}

// ----------------- Queries -----------------

pub async fn get_recipe_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    recipe_id: i64,
) -> Result<Recipe, RequestError> {
    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("");
    push_recipe_select(&mut builder, viewer);
    builder.push(" WHERE recipes.id = ").push_bind(recipe_id);
    builder
        .build_query_as::<Recipe>()
        .fetch_optional(pool)
        .await?
        .ok_or(RequestError::NotFound("Recipe not found"))
}

pub async fn get_recipe_summary_in_db(
    pool: &SqlitePool,
    recipe_id: i64,
) -> Result<RecipeSummary, RequestError> {
    sqlx::query_as::<_, RecipeSummary>(
        "SELECT id, name, image, cooking_time FROM recipes WHERE id = ?",
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?
    .ok_or(RequestError::NotFound("Recipe not found"))
}

fn push_recipe_filters(
    builder: &mut sqlx::QueryBuilder<'_, Sqlite>,
    viewer: Option<i64>,
    filters: &RecipeFilters,
) {
    builder.push(" WHERE 1 = 1");
    if let Some(author) = filters.author {
        builder.push(" AND recipes.author_id = ").push_bind(author);
    }
    if !filters.tags.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags JOIN tags ON tags.id = recipe_tags.tag_id
                          WHERE recipe_tags.recipe_id = recipes.id AND tags.slug IN (",
        );
        let mut separated = builder.separated(", ");
        for slug in &filters.tags {
            separated.push_bind(slug.clone());
        }
        separated.push_unseparated("))");
    }
    for (wanted, table) in [
        (filters.is_favorited, "favorites"),
        (filters.is_in_shopping_cart, "shopping_carts"),
    ] {
        if !wanted {
            continue;
        }
        match viewer {
            Some(viewer) => {
                builder
                    .push(format!(
                        " AND EXISTS (SELECT 1 FROM {table}
                                      WHERE {table}.recipe_id = recipes.id AND {table}.user_id = "
                    ))
                    .push_bind(viewer)
                    .push(")");
            }
            None => {
                builder.push(" AND 0");
            }
        }
    }
}

/// Newest first. Returns the requested page and the total number of matches.
pub async fn list_recipes_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    filters: &RecipeFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Recipe>, i64), RequestError> {
    let mut tx = pool.begin().await?;

    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM recipes");
    push_recipe_filters(&mut builder, viewer, filters);
    let (count,): (i64,) = builder.build_query_as().fetch_one(&mut tx).await?;

    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("");
    push_recipe_select(&mut builder, viewer);
    push_recipe_filters(&mut builder, viewer, filters);
    builder
        .push(" ORDER BY recipes.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let recipes = builder
        .build_query_as::<Recipe>()
        .fetch_all(&mut tx)
        .await?;

    tx.commit().await?;
    Ok((recipes, count))
}
