use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Extension, Json,
};
use sqlx::SqlitePool;
use tracing::warn;

use crate::{
    authentication::{
        get_jwt_token, hash_password_argon2, verify_password_argon2, AuthUser, MaybeUser,
    },
    data_formats::{
        CreateRecipeRequest, CreateTagRequest, CreatedUserResponse, IngredientQueryParams,
        IngredientResponse, LoginRequest, PageParams, Paginated, RecipeQueryParams,
        RecipeResponse, RecipeShortResponse, RegisterRequest, SetPasswordRequest,
        SubscriptionQueryParams, SubscriptionResponse, TagResponse, TokenResponse,
        UpdateRecipeRequest, UserResponse,
    },
    db_helpers::{self, RecipeCollection},
    errors::RequestError,
    models::Recipe,
    validation::{validate_email, validate_text, validate_username, LIMIT_NAME},
    AppState,
};

type State = Extension<Arc<AppState>>;
type JsonResult<T> = Result<Json<T>, RequestError>;
type CreatedResult<T> = Result<(StatusCode, Json<T>), RequestError>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}

async fn recipe_response(
    pool: &SqlitePool,
    viewer: Option<i64>,
    recipe: Recipe,
) -> Result<RecipeResponse, RequestError> {
    let author = db_helpers::get_profile_in_db(pool, viewer, recipe.author_id).await?;
    let tags = db_helpers::get_recipe_tags_in_db(pool, recipe.id).await?;
    let ingredients = db_helpers::get_recipe_ingredients_in_db(pool, recipe.id).await?;
    Ok(RecipeResponse {
        id: recipe.id,
        tags: tags.into_iter().map(Into::into).collect(),
        author: author.into(),
        ingredients: ingredients.into_iter().map(Into::into).collect(),
        is_favorited: recipe.is_favorited,
        is_in_shopping_cart: recipe.is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

async fn store_image(state: &AppState, image: Option<String>) -> Result<Option<String>, RequestError> {
    match image {
        Some(data_uri) => Ok(Some(state.images.save(&data_uri).await?)),
        None => Ok(None),
    }
}

/// Removes the freshly stored image when the write that would reference it failed.
async fn discard_image_on_error<T>(
    state: &AppState,
    image: Option<String>,
    result: Result<T, RequestError>,
) -> Result<T, RequestError> {
    if result.is_err() {
        if let Some(reference) = image {
            state.images.discard(&reference).await;
        }
    }
    result
}

// ----------------- User Handlers -----------------
pub async fn register_user(
    Extension(state): State,
    Json(mut user): Json<RegisterRequest>,
) -> CreatedResult<CreatedUserResponse> {
    validate_email(&user.email)?;
    validate_username(&user.username)?;
    validate_text("first_name", &user.first_name, LIMIT_NAME)?;
    validate_text("last_name", &user.last_name, LIMIT_NAME)?;
    validate_text("password", &user.password, LIMIT_NAME)?;

    user.password = hash_password_argon2(user.password).await.map_err(|e| {
        warn!(error = %e, "could not hash password");
        RequestError::ServerError
    })?;
    let user = db_helpers::insert_user(&state.pool, &user).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login_user(
    Extension(state): State,
    Json(request): Json<LoginRequest>,
) -> JsonResult<TokenResponse> {
    let rejected = || RequestError::validation("Unable to log in with provided credentials");

    let user = db_helpers::get_user_by_email(&state.pool, &request.email)
        .await?
        .ok_or_else(rejected)?;
    let is_password_correct = verify_password_argon2(request.password, &user.password)
        .await
        .map_err(|_| rejected())?;
    if !is_password_correct {
        return Err(rejected());
    }

    let auth_token = get_jwt_token(user.id).map_err(|e| {
        warn!(error = %e, "could not issue token");
        RequestError::ServerError
    })?;
    Ok(Json(TokenResponse { auth_token }))
}

pub async fn get_current_user(
    Extension(state): State,
    user: AuthUser,
) -> JsonResult<UserResponse> {
    let profile = db_helpers::get_profile_in_db(&state.pool, Some(user.id), user.id).await?;
    Ok(Json(profile.into()))
}

pub async fn delete_current_user(
    Extension(state): State,
    user: AuthUser,
) -> Result<StatusCode, RequestError> {
    db_helpers::delete_user_in_db(&state.pool, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    Extension(state): State,
    maybe_user: MaybeUser,
    Query(params): Query<PageParams>,
) -> JsonResult<Paginated<UserResponse>> {
    let (page, limit, offset) = params.resolve(state.config.page_size);
    let (profiles, count) =
        db_helpers::list_profiles_in_db(&state.pool, maybe_user.get_id(), limit, offset).await?;
    let results = profiles.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(results, count, "/api/users/", page, limit)))
}

pub async fn get_user(
    Extension(state): State,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> JsonResult<UserResponse> {
    let profile = db_helpers::get_profile_in_db(&state.pool, maybe_user.get_id(), id).await?;
    Ok(Json(profile.into()))
}

pub async fn set_password(
    Extension(state): State,
    user: AuthUser,
    Json(request): Json<SetPasswordRequest>,
) -> Result<StatusCode, RequestError> {
    validate_text("new_password", &request.new_password, LIMIT_NAME)?;
    let stored = db_helpers::get_user_by_id(&state.pool, user.id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    let is_password_correct = verify_password_argon2(request.current_password, &stored.password)
        .await
        .map_err(|_| RequestError::ServerError)?;
    if !is_password_correct {
        return Err(RequestError::validation("Current password is incorrect"));
    }

    let hashed = hash_password_argon2(request.new_password)
        .await
        .map_err(|_| RequestError::ServerError)?;
    db_helpers::set_password_in_db(&state.pool, user.id, &hashed).await?;
    Ok(StatusCode::NO_CONTENT)
}
// ----------------- End User Handlers -----------------

// ----------------- Subscription Handlers -----------------
pub async fn list_subscriptions(
    Extension(state): State,
    user: AuthUser,
    Query(params): Query<SubscriptionQueryParams>,
) -> JsonResult<Paginated<SubscriptionResponse>> {
    let (page, limit, offset) = params.page_params().resolve(state.config.page_size);
    let recipes_limit = params.recipes_limit.unwrap_or(state.config.recipes_limit);
    let (subscriptions, count) =
        db_helpers::list_following_in_db(&state.pool, user.id, recipes_limit, limit, offset)
            .await?;
    let results = subscriptions.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(
        results,
        count,
        "/api/users/subscriptions/",
        page,
        limit,
    )))
}

pub async fn subscribe(
    Extension(state): State,
    user: AuthUser,
    Path(author_id): Path<i64>,
    Query(params): Query<SubscriptionQueryParams>,
) -> CreatedResult<SubscriptionResponse> {
    db_helpers::follow_in_db(&state.pool, user.id, author_id).await?;
    let recipes_limit = params.recipes_limit.unwrap_or(state.config.recipes_limit);
    let subscription =
        db_helpers::get_subscription_in_db(&state.pool, user.id, author_id, recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn unsubscribe(
    Extension(state): State,
    user: AuthUser,
    Path(author_id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    db_helpers::unfollow_in_db(&state.pool, user.id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------- Tag & Ingredient Handlers -----------------
pub async fn list_tags(Extension(state): State) -> JsonResult<Vec<TagResponse>> {
    let tags = db_helpers::get_tags_in_db(&state.pool).await?;
    Ok(Json(tags.into_iter().map(Into::into).collect()))
}

pub async fn get_tag(Extension(state): State, Path(id): Path<i64>) -> JsonResult<TagResponse> {
    let tag = db_helpers::get_tag_in_db(&state.pool, id).await?;
    Ok(Json(tag.into()))
}

pub async fn create_tag(
    Extension(state): State,
    _user: AuthUser,
    Json(request): Json<CreateTagRequest>,
) -> CreatedResult<TagResponse> {
    let tag = db_helpers::create_tag_in_db(&state.pool, request).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

pub async fn list_ingredients(
    Extension(state): State,
    Query(params): Query<IngredientQueryParams>,
) -> JsonResult<Vec<IngredientResponse>> {
    let ingredients =
        db_helpers::list_ingredients_in_db(&state.pool, params.name.as_deref()).await?;
    Ok(Json(ingredients.into_iter().map(Into::into).collect()))
}

pub async fn get_ingredient(
    Extension(state): State,
    Path(id): Path<i64>,
) -> JsonResult<IngredientResponse> {
    let ingredient = db_helpers::get_ingredient_in_db(&state.pool, id).await?;
    Ok(Json(ingredient.into()))
}

// ----------------- Recipe Handlers -----------------
pub async fn list_recipes(
    Extension(state): State,
    maybe_user: MaybeUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> JsonResult<Paginated<RecipeResponse>> {
    let viewer = maybe_user.get_id();
    let params = RecipeQueryParams::from_pairs(pairs)?;
    let (page, limit, offset) = params.page.resolve(state.config.page_size);
    let (recipes, count) =
        db_helpers::list_recipes_in_db(&state.pool, viewer, &params.filters, limit, offset)
            .await?;

    let mut results = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        results.push(recipe_response(&state.pool, viewer, recipe).await?);
    }
    Ok(Json(Paginated::new(results, count, "/api/recipes/", page, limit)))
}

pub async fn get_recipe(
    Extension(state): State,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> JsonResult<RecipeResponse> {
    let viewer = maybe_user.get_id();
    let recipe = db_helpers::get_recipe_in_db(&state.pool, viewer, id).await?;
    Ok(Json(recipe_response(&state.pool, viewer, recipe).await?))
}

pub async fn create_recipe(
    Extension(state): State,
    user: AuthUser,
    Json(mut request): Json<CreateRecipeRequest>,
) -> CreatedResult<RecipeResponse> {
    let image = store_image(&state, request.image.take()).await?;
    let result =
        db_helpers::create_recipe_in_db(&state.pool, user.id, request.into_new_recipe(image.clone()))
            .await;
    let id = discard_image_on_error(&state, image, result).await?;
    let recipe = db_helpers::get_recipe_in_db(&state.pool, Some(user.id), id).await?;
    Ok((
        StatusCode::CREATED,
        Json(recipe_response(&state.pool, Some(user.id), recipe).await?),
    ))
}

pub async fn update_recipe(
    Extension(state): State,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(mut request): Json<UpdateRecipeRequest>,
) -> JsonResult<RecipeResponse> {
    let image = store_image(&state, request.image.take()).await?;
    let result =
        db_helpers::update_recipe_in_db(&state.pool, user.id, id, request.into_changes(image.clone()))
            .await;
    discard_image_on_error(&state, image, result).await?;
    let recipe = db_helpers::get_recipe_in_db(&state.pool, Some(user.id), id).await?;
    Ok(Json(recipe_response(&state.pool, Some(user.id), recipe).await?))
}

pub async fn delete_recipe(
    Extension(state): State,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    db_helpers::delete_recipe_in_db(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_recipe_to<C: RecipeCollection + Send + Sync + 'static>(
    Extension(state): State,
    user: AuthUser,
    Path(id): Path<i64>,
) -> CreatedResult<RecipeShortResponse> {
    let summary = db_helpers::add_to_collection::<C>(&state.pool, user.id, id).await?;
    Ok((StatusCode::CREATED, Json(summary.into())))
}

pub async fn remove_recipe_from<C: RecipeCollection + Send + Sync + 'static>(
    Extension(state): State,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    db_helpers::remove_from_collection::<C>(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_shopping_cart(
    Extension(state): State,
    user: AuthUser,
) -> Result<impl IntoResponse, RequestError> {
    let lines = db_helpers::aggregate_shopping_list_in_db(&state.pool, user.id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.txt\"",
            ),
        ],
        db_helpers::render_shopping_list(&lines),
    ))
}
