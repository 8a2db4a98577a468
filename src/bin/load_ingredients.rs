// Seeds the ingredient catalogue from a JSON file of `{"name", "measurement_unit"}` objects.

use anyhow::{Context, Result};
use foodgram::{db_helpers::load_ingredients_in_db, init_db, Config};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: load-ingredients <path/to/ingredients.json>")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    let records: Vec<IngredientRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {path}"))?;

    let config = Config::load()?;
    let pool = init_db(&config.database_url).await?;
    let rows = records
        .into_iter()
        .map(|record| (record.name, record.measurement_unit))
        .collect::<Vec<_>>();
    let inserted = load_ingredients_in_db(&pool, &rows).await?;
    info!(%path, total = rows.len(), inserted, "ingredients loaded");
    Ok(())
}
