mod authentication;
pub mod config;
mod data_formats;
pub mod db_helpers;
mod errors;
mod handlers;
mod images;
pub mod models;
mod validation;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
pub use config::Config;
pub use data_formats::*;
use db_helpers::{Favorites, ShoppingCart};
pub use errors::RequestError;
use handlers::*;
pub use images::ImageStore;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};
use tracing::info;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Shared by every handler through an `Extension` layer.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub images: ImageStore,
}

pub async fn run_app(app: Router, config: Config) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    let address = config.bind_address;
    let state = AppState {
        pool,
        images: ImageStore::new(config.media_root.clone()),
        config,
    };
    let app = app.layer(Extension(Arc::new(state)));
    info!(%address, "server listening");
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!(db_url, "creating database");
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {db_url}"))?;
    } else {
        info!(db_url, "database already exists");
    }
    let pool = SqlitePool::connect(db_url).await?;
    info!("running migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("migrations completed");
    Ok(pool)
}

pub fn get_random_free_port() -> Result<(u16, SocketAddr)> {
    let listener = TcpListener::bind("localhost:0").context("Could not bind a free port")?;
    let addr = listener
        .local_addr()
        .context("Could not get a free port")?;
    Ok((addr.port(), addr))
}

pub fn make_router() -> Router {
    let api = Router::new()
        .route("/auth/token/login/", post(login_user))
        .route("/users/", get(list_users).post(register_user))
        .route(
            "/users/me/",
            get(get_current_user).delete(delete_current_user),
        )
        .route("/users/set_password/", post(set_password))
        .route("/users/subscriptions/", get(list_subscriptions))
        .route("/users/:id/", get(get_user))
        .route("/users/:id/subscribe/", post(subscribe).delete(unsubscribe))
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/:id/", get(get_tag))
        .route("/ingredients/", get(list_ingredients))
        .route("/ingredients/:id/", get(get_ingredient))
        .route("/recipes/", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/download_shopping_cart/",
            get(download_shopping_cart),
        )
        .route(
            "/recipes/:id/",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite/",
            post(add_recipe_to::<Favorites>).delete(remove_recipe_from::<Favorites>),
        )
        .route(
            "/recipes/:id/shopping_cart/",
            post(add_recipe_to::<ShoppingCart>).delete(remove_recipe_from::<ShoppingCart>),
        );

    Router::new()
        .route("/check_health", get(alive))
        .nest("/api", api)
        .fallback(not_found)
}
