use sqlx::{Sqlite, Transaction};

mod collection_helpers;
mod follow_helpers;
mod ingredient_helpers;
mod recipe_helpers;
mod shopping_list_helpers;
mod tag_helpers;
mod user_helpers;

pub use collection_helpers::*;
pub use follow_helpers::*;
pub use ingredient_helpers::*;
pub use recipe_helpers::*;
pub use shopping_list_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

enum SetValue {
    Text(String),
    Integer(i64),
}

/// Builds `UPDATE <table> SET ... WHERE id = ?` from the fields that were supplied.
struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<(&'static str, SetValue)>,
}

impl UpdateBuilder {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: vec![],
        }
    }

    fn set_text(mut self, column: &'static str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.assignments.push((column, SetValue::Text(value)));
        }
        self
    }

    fn set_integer(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(value) = value {
            self.assignments.push((column, SetValue::Integer(value)));
        }
        self
    }

    fn build(&self) -> Option<String> {
        if self.assignments.is_empty() {
            return None;
        }
        let set = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("UPDATE {} SET {set} WHERE id = ?", self.table))
    }

    async fn execute(
        self,
        tx: &mut Transaction<'_, Sqlite>,
        id: i64,
    ) -> Result<u64, sqlx::Error> {
        let Some(sql) = self.build() else {
            return Ok(0);
        };
        let mut query = sqlx::query(&sql);
        for (_, value) in self.assignments {
            query = match value {
                SetValue::Text(text) => query.bind(text),
                SetValue::Integer(integer) => query.bind(integer),
            };
        }
        let result = query.bind(id).execute(&mut *tx).await?;
        Ok(result.rows_affected())
    }
}

/// Pushes `(?, ?, ...)` binding every id; callers must not pass an empty slice.
fn push_id_list(builder: &mut sqlx::QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
pub(crate) mod test_utils {
    use sqlx::{
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
        SqlitePool,
    };
    use tempfile::TempDir;

    use crate::models::{IngredientEntry, NewRecipe};

    pub async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    /// A file-backed database with several connections, for tests that need real concurrency.
    pub async fn shared_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("shared.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        (dir, pool)
    }

    pub async fn create_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (email, username, first_name, last_name, password)
             VALUES (?, ?, 'Test', 'User', 'not-a-hash') RETURNING id",
        )
        .bind(format!("{username}@example.com"))
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn create_ingredient(pool: &SqlitePool, name: &str, unit: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO ingredients (name, name_lower, measurement_unit) VALUES (?, ?, ?)
             RETURNING id",
        )
        .bind(name)
        .bind(name.to_lowercase())
        .bind(unit)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn create_tag(pool: &SqlitePool, slug: &str, color: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO tags (name, color, slug) VALUES (?, ?, ?) RETURNING id")
            .bind(slug.to_uppercase())
            .bind(color)
            .bind(slug)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    pub fn new_recipe(name: &str, tags: Vec<i64>, ingredients: &[(i64, i64)]) -> NewRecipe {
        NewRecipe {
            name: name.to_string(),
            text: format!("How to cook {name}"),
            cooking_time: 30,
            image: None,
            tags,
            ingredients: ingredients
                .iter()
                .map(|&(id, amount)| IngredientEntry { id, amount })
                .collect(),
        }
    }

    pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }
}
