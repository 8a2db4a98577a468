use sqlx::SqlitePool;

use crate::{errors::RequestError, models::ShoppingListLine};

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";

/// Sums every ingredient line of the recipes in the user's cart, per (name, unit), ordered by name.
pub async fn aggregate_shopping_list_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<ShoppingListLine>, RequestError> {
    let lines = sqlx::query_as::<_, ShoppingListLine>(
        r#"
        SELECT ingredients.name                AS name,
               ingredients.measurement_unit    AS measurement_unit,
               SUM(recipe_ingredients.amount)  AS amount
        FROM   shopping_carts
               JOIN recipe_ingredients
                 ON recipe_ingredients.recipe_id = shopping_carts.recipe_id
               JOIN ingredients
                 ON ingredients.id = recipe_ingredients.ingredient_id
        WHERE  shopping_carts.user_id = ?
        GROUP  BY ingredients.name, ingredients.measurement_unit
        ORDER  BY ingredients.name, ingredients.measurement_unit
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(lines)
}

pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    let mut text = format!("{SHOPPING_LIST_HEADER}\n");
    for ShoppingListLine {
        name,
        measurement_unit,
        amount,
    } in lines
    {
        text.push_str(&format!("{name} ({measurement_unit}) - {amount}\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::{
        add_to_collection, create_recipe_in_db, remove_from_collection,
        test_utils::{create_ingredient, create_user, new_recipe, test_pool},
        Favorites, ShoppingCart,
    };

    #[tokio::test]
    async fn sums_amounts_across_cart_recipes() {
        let pool = test_pool().await;
        let user = create_user(&pool, "anna").await;
        let flour = create_ingredient(&pool, "flour", "g").await;
        let sugar = create_ingredient(&pool, "sugar", "g").await;
        let salt = create_ingredient(&pool, "salt", "g").await;

        let a = create_recipe_in_db(&pool, user, new_recipe("A", vec![], &[(flour, 200)]))
            .await
            .unwrap();
        let b = create_recipe_in_db(&pool, user, new_recipe("B", vec![], &[(sugar, 100), (flour, 300)]))
            .await
            .unwrap();
        let not_in_cart = create_recipe_in_db(&pool, user, new_recipe("C", vec![], &[(salt, 5)]))
            .await
            .unwrap();
        add_to_collection::<ShoppingCart>(&pool, user, a).await.unwrap();
        add_to_collection::<ShoppingCart>(&pool, user, b).await.unwrap();
        add_to_collection::<Favorites>(&pool, user, not_in_cart).await.unwrap();

        let lines = aggregate_shopping_list_in_db(&pool, user).await.unwrap();
        let rendered = render_shopping_list(&lines);
        let body = rendered.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(rendered.lines().next(), Some(SHOPPING_LIST_HEADER));
        assert_eq!(body, ["flour (g) - 500", "sugar (g) - 100"]);
    }

    #[tokio::test]
    async fn same_name_with_different_units_stays_apart() {
        let pool = test_pool().await;
        let user = create_user(&pool, "anna").await;
        let milk_ml = create_ingredient(&pool, "milk", "ml").await;
        let milk_cup = create_ingredient(&pool, "milk", "cup").await;
        let recipe = create_recipe_in_db(
            &pool,
            user,
            new_recipe("latte", vec![], &[(milk_ml, 200), (milk_cup, 1)]),
        )
        .await
        .unwrap();
        add_to_collection::<ShoppingCart>(&pool, user, recipe).await.unwrap();

        let lines = aggregate_shopping_list_in_db(&pool, user).await.unwrap();
        assert_eq!(
            lines,
            vec![
                ShoppingListLine {
                    name: "milk".into(),
                    measurement_unit: "cup".into(),
                    amount: 1
                },
                ShoppingListLine {
                    name: "milk".into(),
                    measurement_unit: "ml".into(),
                    amount: 200
                },
            ]
        );
    }

    #[tokio::test]
    async fn reflects_current_cart_contents() {
        let pool = test_pool().await;
        let user = create_user(&pool, "anna").await;
        let other = create_user(&pool, "bob").await;
        let flour = create_ingredient(&pool, "flour", "g").await;
        let recipe = create_recipe_in_db(&pool, user, new_recipe("bread", vec![], &[(flour, 250)]))
            .await
            .unwrap();

        assert_eq!(render_shopping_list(&[]), "Shopping list:\n");
        add_to_collection::<ShoppingCart>(&pool, other, recipe).await.unwrap();
        assert!(aggregate_shopping_list_in_db(&pool, user).await.unwrap().is_empty());

        add_to_collection::<ShoppingCart>(&pool, user, recipe).await.unwrap();
        assert_eq!(aggregate_shopping_list_in_db(&pool, user).await.unwrap().len(), 1);

        remove_from_collection::<ShoppingCart>(&pool, user, recipe).await.unwrap();
        assert!(aggregate_shopping_list_in_db(&pool, user).await.unwrap().is_empty());
    }
}
