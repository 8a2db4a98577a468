use sqlx::SqlitePool;
use tracing::info;

use crate::{
    data_formats::request::RegisterRequest,
    errors::RequestError,
    models::{Profile, User},
};

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password, created_at";

// Binds: viewer id first.
pub(crate) const PROFILE_COLUMNS: &str = r#"
    users.id, users.email, users.username, users.first_name, users.last_name,
    EXISTS (SELECT 1 FROM follows
            WHERE follows.user_id = ? AND follows.author_id = users.id) AS is_subscribed
"#;

// ----------------- Lookups -----------------

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, RequestError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn get_profile_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Profile, RequestError> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE users.id = ?"
    ))
    .bind(viewer)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RequestError::NotFound("User not found"))
}

pub async fn list_profiles_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Profile>, i64), RequestError> {
    let mut tx = pool.begin().await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut tx)
        .await?;
    let profiles = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users ORDER BY users.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok((profiles, count))
}

// ----------------- User Queries -----------------

/// `user.password` must already be hashed.
pub async fn insert_user(pool: &SqlitePool, user: &RegisterRequest) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, username, first_name, last_name, password)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password)
    .fetch_one(&mut tx)
    .await;

    let user = match result {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.message().contains("users.email") => {
            return Err(RequestError::validation("A user with that email already exists"))
        }
        Err(sqlx::Error::Database(e)) if e.message().contains("users.username") => {
            return Err(RequestError::validation("A user with that username already exists"))
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;
    info!(user_id = user.id, username = %user.username, "registered user");
    Ok(user)
}

pub async fn set_password_in_db(
    pool: &SqlitePool,
    id: i64,
    hashed_password: &str,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("User not found"));
    }
    tx.commit().await?;
    Ok(())
}

/// Deletes a user along with everything that depends on them:
/// their recipes (and those recipes' tags, ingredients, favorites and cart rows),
/// their own favorites and cart, and follow edges in both directions.
pub async fn delete_user_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;

    for table in ["recipe_ingredients", "recipe_tags", "favorites", "shopping_carts"] {
        sqlx::query(&format!(
            "DELETE FROM {table} WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = ?)"
        ))
        .bind(id)
        .execute(&mut tx)
        .await?;
    }
    sqlx::query("DELETE FROM recipes WHERE author_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    for table in ["favorites", "shopping_carts"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?"))
            .bind(id)
            .execute(&mut tx)
            .await?;
    }
    sqlx::query("DELETE FROM follows WHERE user_id = ? OR author_id = ?")
        .bind(id)
        .bind(id)
        .execute(&mut tx)
        .await?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("User not found"));
    }

    tx.commit().await?;
    info!(user_id = id, "deleted user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::{
        add_to_collection, create_recipe_in_db, follow_in_db,
        test_utils::{count, create_ingredient, create_tag, create_user, new_recipe, test_pool},
        Favorites, ShoppingCart,
    };

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Anna".to_string(),
            last_name: "Smith".to_string(),
            password: "hashed".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_and_username_are_validation_errors() {
        let pool = test_pool().await;
        insert_user(&pool, &register("anna", "anna@example.com"))
            .await
            .unwrap();

        let same_email = insert_user(&pool, &register("other", "anna@example.com")).await;
        assert!(matches!(same_email, Err(RequestError::Validation(m)) if m.contains("email")));

        let same_name = insert_user(&pool, &register("anna", "other@example.com")).await;
        assert!(matches!(same_name, Err(RequestError::Validation(m)) if m.contains("username")));

        assert_eq!(count(&pool, "users").await, 1);
    }

    #[tokio::test]
    async fn profile_reports_subscription_for_viewer() {
        let pool = test_pool().await;
        let anna = create_user(&pool, "anna").await;
        let bob = create_user(&pool, "bob").await;
        follow_in_db(&pool, anna, bob).await.unwrap();

        assert!(get_profile_in_db(&pool, Some(anna), bob).await.unwrap().is_subscribed);
        assert!(!get_profile_in_db(&pool, Some(bob), anna).await.unwrap().is_subscribed);
        assert!(!get_profile_in_db(&pool, None, bob).await.unwrap().is_subscribed);
        assert!(matches!(
            get_profile_in_db(&pool, None, 999).await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_everything_they_own() {
        let pool = test_pool().await;
        let anna = create_user(&pool, "anna").await;
        let bob = create_user(&pool, "bob").await;
        let flour = create_ingredient(&pool, "flour", "g").await;
        let tag = create_tag(&pool, "lunch", "#112233").await;

        let annas = create_recipe_in_db(&pool, anna, new_recipe("bread", vec![tag], &[(flour, 200)]))
            .await
            .unwrap();
        let bobs = create_recipe_in_db(&pool, bob, new_recipe("cake", vec![tag], &[(flour, 300)]))
            .await
            .unwrap();

        add_to_collection::<Favorites>(&pool, bob, annas).await.unwrap();
        add_to_collection::<ShoppingCart>(&pool, anna, bobs).await.unwrap();
        follow_in_db(&pool, anna, bob).await.unwrap();
        follow_in_db(&pool, bob, anna).await.unwrap();

        delete_user_in_db(&pool, anna).await.unwrap();

        assert_eq!(count(&pool, "users").await, 1);
        assert_eq!(count(&pool, "recipes").await, 1);
        assert_eq!(count(&pool, "recipe_ingredients").await, 1);
        assert_eq!(count(&pool, "recipe_tags").await, 1);
        assert_eq!(count(&pool, "favorites").await, 0);
        assert_eq!(count(&pool, "shopping_carts").await, 0);
        assert_eq!(count(&pool, "follows").await, 0);
    }
}
