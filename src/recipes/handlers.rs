use std::collections::BTreeSet;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AttrResponse, RecipeDetail, RecipeImageResponse, RecipeListItem, RecipePayload, RecipeQuery},
    images::{recipe_image_file_path, sniff_image},
};
use crate::{
    auth::extractors::AuthUser,
    db::{AttrKind, Recipe, RecipeDraft, RecipeFilter},
    error::{ApiError, FieldErrors, JsonBody},
    state::AppState,
    validate,
};

const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recipe/recipes/", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipe/recipes/:id/",
            get(get_recipe)
                .put(put_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/api/recipe/recipes/:id/upload-image/",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
}

/// `"1,2"` into ids. An absent or empty parameter means no filtering.
fn parse_ids(param: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|part| {
            part.trim().parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("{param} must be a comma-separated list of ids"))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Checks every id belongs to `owner`; unknown or foreign ids become field errors.
async fn owned_ids(
    state: &AppState,
    kind: AttrKind,
    owner: Uuid,
    field: &str,
    ids: Vec<i64>,
    errors: &mut FieldErrors,
) -> Result<Vec<i64>, ApiError> {
    let found: BTreeSet<i64> = state
        .store
        .attrs_by_ids(kind, owner, &ids)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    for id in ids.iter().filter(|id| !found.contains(id)) {
        errors.add(field, format!("Invalid pk \"{id}\" - object does not exist."));
    }
    Ok(found.into_iter().collect())
}

/// Applies `payload` on top of `base`. With `required`, title, time and price
/// must be present; omitted relations keep the values of `base`.
async fn build_draft(
    state: &AppState,
    owner: Uuid,
    payload: RecipePayload,
    mut base: RecipeDraft,
    required: bool,
) -> Result<RecipeDraft, ApiError> {
    let mut errors = FieldErrors::new();
    let title = validate::text(&mut errors, "title", payload.title, required);
    let time_minutes = validate::minutes(&mut errors, "time_minutes", payload.time_minutes, required);
    let price = validate::price(&mut errors, "price", payload.price, required);
    let link = validate::optional_text(&mut errors, "link", payload.link);
    let tags = match payload.tags {
        Some(ids) => Some(owned_ids(state, AttrKind::Tag, owner, "tags", ids, &mut errors).await?),
        None => None,
    };
    let ingredients = match payload.ingredients {
        Some(ids) => {
            Some(owned_ids(state, AttrKind::Ingredient, owner, "ingredients", ids, &mut errors).await?)
        }
        None => None,
    };
    errors.into_result()?;

    if let Some(title) = title {
        base.title = title;
    }
    if let Some(time_minutes) = time_minutes {
        base.time_minutes = time_minutes;
    }
    if let Some(price) = price {
        base.price = price;
    }
    if let Some(link) = link {
        base.link = link;
    }
    if let Some(tags) = tags {
        base.tags = tags;
    }
    if let Some(ingredients) = ingredients {
        base.ingredients = ingredients;
    }
    Ok(base)
}

async fn detail(state: &AppState, recipe: Recipe) -> Result<RecipeDetail, ApiError> {
    let tags = state
        .store
        .attrs_by_ids(AttrKind::Tag, recipe.user_id, &recipe.tags)
        .await?;
    let ingredients = state
        .store
        .attrs_by_ids(AttrKind::Ingredient, recipe.user_id, &recipe.ingredients)
        .await?;
    Ok(RecipeDetail {
        id: recipe.id,
        image: recipe.image.as_deref().map(|key| state.storage.url(key)),
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        tags: tags.into_iter().map(AttrResponse::from).collect(),
        ingredients: ingredients.into_iter().map(AttrResponse::from).collect(),
    })
}

async fn owned_recipe(state: &AppState, owner: Uuid, id: i64) -> Result<Recipe, ApiError> {
    state
        .store
        .get_recipe(owner, id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn discard_image(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %format!("{e:#}"), key, "failed to delete stored image");
    }
}

#[instrument(skip(state, user))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<RecipeListItem>>, ApiError> {
    let filter = RecipeFilter {
        tags: parse_ids("tags", query.tags.as_deref())?,
        ingredients: parse_ids("ingredients", query.ingredients.as_deref())?,
    };
    let recipes = state.store.list_recipes(user.id, &filter).await?;
    Ok(Json(recipes.into_iter().map(RecipeListItem::from).collect()))
}

#[instrument(skip(state, user, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeDetail>), ApiError> {
    let draft = build_draft(&state, user.id, payload, RecipeDraft::default(), true).await?;
    let recipe = state.store.insert_recipe(user.id, draft).await?;
    info!(recipe_id = recipe.id, user_id = %user.id, "recipe created");
    Ok((StatusCode::CREATED, Json(detail(&state, recipe).await?)))
}

#[instrument(skip(state, user))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let recipe = owned_recipe(&state, user.id, id).await?;
    Ok(Json(detail(&state, recipe).await?))
}

#[instrument(skip(state, user, payload))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update_recipe(&state, user.id, id, payload, true).await
}

#[instrument(skip(state, user, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update_recipe(&state, user.id, id, payload, false).await
}

async fn update_recipe(
    state: &AppState,
    owner: Uuid,
    id: i64,
    payload: RecipePayload,
    full: bool,
) -> Result<Json<RecipeDetail>, ApiError> {
    let existing = owned_recipe(state, owner, id).await?;
    let draft = build_draft(state, owner, payload, existing.into(), full).await?;
    let recipe = state
        .store
        .update_recipe(owner, id, draft)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(recipe_id = id, user_id = %owner, "recipe updated");
    Ok(Json(detail(state, recipe).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let recipe = owned_recipe(&state, user.id, id).await?;
    if !state.store.delete_recipe(user.id, id).await? {
        return Err(ApiError::NotFound);
    }
    if let Some(key) = &recipe.image {
        discard_image(&state, key).await;
    }
    info!(recipe_id = id, user_id = %user.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST multipart with an `image` file field.
#[instrument(skip(state, user, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    mut mp: Multipart,
) -> Result<Json<RecipeImageResponse>, ApiError> {
    let recipe = owned_recipe(&state, user.id, id).await?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or("image").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload.filter(|(_, data)| !data.is_empty()) else {
        return Err(ApiError::Validation(FieldErrors::single(
            "image",
            "No file was submitted.",
        )));
    };
    let Some(content_type) = sniff_image(&data) else {
        return Err(ApiError::Validation(FieldErrors::single(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        )));
    };

    let key = recipe_image_file_path(&filename);
    state.storage.put_object(&key, data, content_type).await?;
    if !state.store.set_recipe_image(user.id, id, &key).await? {
        discard_image(&state, &key).await;
        return Err(ApiError::NotFound);
    }
    if let Some(old) = recipe.image.as_deref().filter(|old| *old != key) {
        discard_image(&state, old).await;
    }

    info!(recipe_id = id, key = %key, "recipe image stored");
    Ok(Json(RecipeImageResponse {
        id,
        image: state.storage.url(&key),
    }))
}
