use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    data_formats::request::CreateTagRequest,
    errors::RequestError,
    models::Tag,
    validation::{validate_color, validate_slug, validate_text, LIMIT_TAG_NAME},
};

use super::push_id_list;

pub async fn get_tags_in_db(pool: &SqlitePool) -> Result<Vec<Tag>, RequestError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY id DESC")
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

pub async fn get_tag_in_db(pool: &SqlitePool, id: i64) -> Result<Tag, RequestError> {
    sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RequestError::NotFound("Tag not found"))
}

pub async fn create_tag_in_db(
    pool: &SqlitePool,
    CreateTagRequest { name, color, slug }: CreateTagRequest,
) -> Result<Tag, RequestError> {
    validate_text("name", &name, LIMIT_TAG_NAME)?;
    validate_color(&color)?;
    validate_slug(&slug)?;

    let mut tx = pool.begin().await?;
    let tag = sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (name, color, slug) VALUES (?, ?, ?) RETURNING id, name, color, slug",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        RequestError::from(e).on_unique_violation(RequestError::Conflict(
            "A tag with this name, color or slug already exists",
        ))
    })?;
    tx.commit().await?;
    Ok(tag)
}

pub async fn get_recipe_tags_in_db(
    pool: &SqlitePool,
    recipe_id: i64,
) -> Result<Vec<Tag>, RequestError> {
    let tags = sqlx::query_as::<_, Tag>(
        "SELECT tags.id, tags.name, tags.color, tags.slug
         FROM tags JOIN recipe_tags ON recipe_tags.tag_id = tags.id
         WHERE recipe_tags.recipe_id = ?
         ORDER BY tags.id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

/// Replaces the tag set of a recipe. Every id must exist; unknown ids are a validation error.
pub(crate) async fn replace_recipe_tags(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> Result<(), RequestError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut builder = sqlx::QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tags WHERE id IN ");
    push_id_list(&mut builder, tag_ids);
    let (found,): (i64,) = builder.build_query_as().fetch_one(&mut *tx).await?;
    if found != tag_ids.len() as i64 {
        return Err(RequestError::validation("Tag does not exist"));
    }

    let mut builder =
        sqlx::QueryBuilder::<Sqlite>::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(tag_ids, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    builder.build().execute(&mut *tx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_utils::test_pool;

    fn request(name: &str, color: &str, slug: &str) -> CreateTagRequest {
        CreateTagRequest {
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn tags_are_unique_by_every_column() {
        let pool = test_pool().await;
        create_tag_in_db(&pool, request("Breakfast", "#E26C2D", "breakfast"))
            .await
            .unwrap();

        for duplicate in [
            request("Breakfast", "#000000", "other"),
            request("Other", "#E26C2D", "other"),
            request("Other", "#000000", "breakfast"),
        ] {
            assert!(matches!(
                create_tag_in_db(&pool, duplicate).await,
                Err(RequestError::Conflict(_))
            ));
        }
        assert_eq!(get_tags_in_db(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_tags_are_rejected() {
        let pool = test_pool().await;
        assert!(matches!(
            create_tag_in_db(&pool, request("Lunch", "red", "lunch")).await,
            Err(RequestError::Validation(_))
        ));
        assert!(matches!(
            create_tag_in_db(&pool, request("Lunch", "#FF0000", "lunch time")).await,
            Err(RequestError::Validation(_))
        ));
    }
}
