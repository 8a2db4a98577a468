use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::{
    errors::RequestError,
    models::{Ingredient, IngredientEntry, RecipeIngredient},
};

use super::push_id_list;

/// Ordered by name; `name` narrows to a case-insensitive prefix match on `name_lower`.
pub async fn list_ingredients_in_db(
    pool: &SqlitePool,
    name: Option<&str>,
) -> Result<Vec<Ingredient>, RequestError> {
    let ingredients = match name.filter(|name| !name.is_empty()) {
        Some(prefix) => {
            let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
            sqlx::query_as::<_, Ingredient>(
                "SELECT id, name, measurement_unit FROM ingredients
                 WHERE name_lower LIKE ? ESCAPE '\\'
                 ORDER BY name, id",
            )
            .bind(pattern)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Ingredient>(
                "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(ingredients)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn get_ingredient_in_db(pool: &SqlitePool, id: i64) -> Result<Ingredient, RequestError> {
    sqlx::query_as::<_, Ingredient>("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RequestError::NotFound("Ingredient not found"))
}

/// Inserts the ingredients that are not present yet and returns how many were added.
pub async fn load_ingredients_in_db(
    pool: &SqlitePool,
    ingredients: &[(String, String)],
) -> Result<u64, RequestError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for (name, measurement_unit) in ingredients {
        inserted += sqlx::query(
            "INSERT INTO ingredients (name, name_lower, measurement_unit) VALUES (?, ?, ?)
             ON CONFLICT (name, measurement_unit) DO NOTHING",
        )
        .bind(name)
        .bind(name.to_lowercase())
        .bind(measurement_unit)
        .execute(&mut tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;
    info!(inserted, total = ingredients.len(), "loaded ingredients");
    Ok(inserted)
}

/// Removes an ingredient and every recipe line that uses it.
pub async fn delete_ingredient_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE ingredient_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    let result = sqlx::query("DELETE FROM ingredients WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("Ingredient not found"));
    }
    tx.commit().await?;
    Ok(())
}

pub async fn get_recipe_ingredients_in_db(
    pool: &SqlitePool,
    recipe_id: i64,
) -> Result<Vec<RecipeIngredient>, RequestError> {
    let ingredients = sqlx::query_as::<_, RecipeIngredient>(
        "SELECT ingredients.id, ingredients.name, ingredients.measurement_unit,
                recipe_ingredients.amount
         FROM recipe_ingredients
         JOIN ingredients ON ingredients.id = recipe_ingredients.ingredient_id
         WHERE recipe_ingredients.recipe_id = ?
         ORDER BY recipe_ingredients.id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;
    Ok(ingredients)
}

/// Deletes every ingredient line of the recipe and bulk-inserts `entries` in their place.
pub(crate) async fn replace_recipe_ingredients(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    entries: &[IngredientEntry],
) -> Result<(), RequestError> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    if entries.is_empty() {
        return Ok(());
    }

    let ids = entries.iter().map(|entry| entry.id).collect::<Vec<_>>();
    let mut builder =
        sqlx::QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ingredients WHERE id IN ");
    push_id_list(&mut builder, &ids);
    let (found,): (i64,) = builder.build_query_as().fetch_one(&mut *tx).await?;
    if found != ids.len() as i64 {
        return Err(RequestError::NotFound("Ingredient not found"));
    }

    let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
    );
    builder.push_values(entries, |mut row, entry| {
        row.push_bind(recipe_id)
            .push_bind(entry.id)
            .push_bind(entry.amount);
    });
    builder.build().execute(&mut *tx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::{
        create_recipe_in_db,
        test_utils::{count, create_ingredient, create_user, new_recipe, test_pool},
    };

    #[tokio::test]
    async fn search_is_a_name_prefix_ordered_by_name() {
        let pool = test_pool().await;
        create_ingredient(&pool, "sugar", "g").await;
        create_ingredient(&pool, "salt", "g").await;
        create_ingredient(&pool, "Salmon", "g").await;
        create_ingredient(&pool, "sea_salt", "g").await;

        let names = |items: Vec<Ingredient>| items.into_iter().map(|i| i.name).collect::<Vec<_>>();

        let all = list_ingredients_in_db(&pool, None).await.unwrap();
        assert_eq!(names(all), ["Salmon", "salt", "sea_salt", "sugar"]);

        let sa = list_ingredients_in_db(&pool, Some("sa")).await.unwrap();
        assert_eq!(names(sa), ["Salmon", "salt"]);

        let underscore = list_ingredients_in_db(&pool, Some("sea_")).await.unwrap();
        assert_eq!(names(underscore), ["sea_salt"]);
    }

    #[tokio::test]
    async fn search_folds_cyrillic_case() {
        let pool = test_pool().await;
        let data = vec![
            ("Мука".to_string(), "г".to_string()),
            ("молоко".to_string(), "мл".to_string()),
            ("Salt".to_string(), "g".to_string()),
        ];
        load_ingredients_in_db(&pool, &data).await.unwrap();
        create_ingredient(&pool, "Масло", "г").await;

        let names = |items: Vec<Ingredient>| items.into_iter().map(|i| i.name).collect::<Vec<_>>();

        let mu = list_ingredients_in_db(&pool, Some("му")).await.unwrap();
        assert_eq!(names(mu), ["Мука"]);
        let upper = list_ingredients_in_db(&pool, Some("МО")).await.unwrap();
        assert_eq!(names(upper), ["молоко"]);
        let ma = list_ingredients_in_db(&pool, Some("ма")).await.unwrap();
        assert_eq!(names(ma), ["Масло"]);
        let sa = list_ingredients_in_db(&pool, Some("sa")).await.unwrap();
        assert_eq!(names(sa), ["Salt"]);
    }

    #[tokio::test]
    async fn loading_twice_inserts_once() {
        let pool = test_pool().await;
        let data = vec![
            ("flour".to_string(), "g".to_string()),
            ("milk".to_string(), "ml".to_string()),
        ];
        assert_eq!(load_ingredients_in_db(&pool, &data).await.unwrap(), 2);
        assert_eq!(load_ingredients_in_db(&pool, &data).await.unwrap(), 0);
        assert_eq!(count(&pool, "ingredients").await, 2);
    }

    #[tokio::test]
    async fn deleting_an_ingredient_removes_its_recipe_lines() {
        let pool = test_pool().await;
        let author = create_user(&pool, "anna").await;
        let flour = create_ingredient(&pool, "flour", "g").await;
        let sugar = create_ingredient(&pool, "sugar", "g").await;
        let recipe = create_recipe_in_db(
            &pool,
            author,
            new_recipe("cake", vec![], &[(flour, 200), (sugar, 50)]),
        )
        .await
        .unwrap();

        delete_ingredient_in_db(&pool, flour).await.unwrap();

        let lines = get_recipe_ingredients_in_db(&pool, recipe).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "sugar");
        assert!(matches!(
            delete_ingredient_in_db(&pool, flour).await,
            Err(RequestError::NotFound(_))
        ));
    }
}
