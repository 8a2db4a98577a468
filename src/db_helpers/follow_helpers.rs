use sqlx::SqlitePool;
use tracing::info;

use crate::{
    errors::RequestError,
    models::{FollowedAuthor, RecipeSummary},
};

use super::get_user_by_id;

const FOLLOWED_AUTHOR_QUERY: &str = r#"
    SELECT users.id, users.email, users.username, users.first_name, users.last_name,
           (SELECT COUNT(*) FROM recipes WHERE recipes.author_id = users.id) AS recipes_count
    FROM follows
    JOIN users ON users.id = follows.author_id
"#;

/// A followed author with their newest recipes, at most `recipes_limit` of them.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub author: FollowedAuthor,
    pub recipes: Vec<RecipeSummary>,
}

pub async fn follow_in_db(
    pool: &SqlitePool,
    user_id: i64,
    author_id: i64,
) -> Result<(), RequestError> {
    if user_id == author_id {
        return Err(RequestError::validation("You cannot follow yourself"));
    }
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(RequestError::NotFound("User not found"));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO follows (user_id, author_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(author_id)
        .execute(&mut tx)
        .await
        .map_err(|e| {
            RequestError::from(e).on_unique_violation(RequestError::validation(
                "You are already following this author",
            ))
        })?;
    tx.commit().await?;

    info!(user_id, author_id, "followed author");
    Ok(())
}

pub async fn unfollow_in_db(
    pool: &SqlitePool,
    user_id: i64,
    author_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
        .bind(user_id)
        .bind(author_id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("You are not following this author"));
    }
    tx.commit().await?;

    info!(user_id, author_id, "unfollowed author");
    Ok(())
}

async fn author_recipes(
    pool: &SqlitePool,
    author_id: i64,
    recipes_limit: i64,
) -> Result<Vec<RecipeSummary>, RequestError> {
    let recipes = sqlx::query_as::<_, RecipeSummary>(
        "SELECT id, name, image, cooking_time FROM recipes
         WHERE author_id = ?
         ORDER BY id DESC
         LIMIT ?",
    )
    .bind(author_id)
    .bind(recipes_limit.max(0))
    .fetch_all(pool)
    .await?;
    Ok(recipes)
}

pub async fn get_subscription_in_db(
    pool: &SqlitePool,
    user_id: i64,
    author_id: i64,
    recipes_limit: i64,
) -> Result<Subscription, RequestError> {
    let author = sqlx::query_as::<_, FollowedAuthor>(&format!(
        "{FOLLOWED_AUTHOR_QUERY} WHERE follows.user_id = ? AND follows.author_id = ?"
    ))
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await?
    .ok_or(RequestError::NotFound("You are not following this author"))?;
    let recipes = author_recipes(pool, author.id, recipes_limit).await?;
    Ok(Subscription { author, recipes })
}

/// Authors followed by `user_id`, most recently followed first.
pub async fn list_following_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipes_limit: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Subscription>, i64), RequestError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let authors = sqlx::query_as::<_, FollowedAuthor>(&format!(
        "{FOLLOWED_AUTHOR_QUERY} WHERE follows.user_id = ? ORDER BY follows.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut subscriptions = Vec::with_capacity(authors.len());
    for author in authors {
        let recipes = author_recipes(pool, author.id, recipes_limit).await?;
        subscriptions.push(Subscription { author, recipes });
    }
    Ok((subscriptions, count))
}
