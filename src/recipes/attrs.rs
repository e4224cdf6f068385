//! Tag and ingredient endpoints. Both kinds share these handlers; the router for
//! each kind carries its [`AttrKind`] as a request extension.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{AttrPayload, AttrQuery, AttrResponse};
use crate::{
    auth::extractors::AuthUser,
    db::AttrKind,
    error::{ApiError, FieldErrors, JsonBody},
    state::AppState,
    validate,
};

pub fn attr_routes(kind: AttrKind, base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(list_attrs).post(create_attr))
        .route(
            &format!("{base}:id/"),
            get(get_attr).put(put_attr).patch(patch_attr).delete(delete_attr),
        )
        .layer(Extension(kind))
}

fn parse_flag(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) => v
            .parse::<i64>()
            .map(|n| n != 0)
            .map_err(|_| ApiError::BadRequest(format!("assigned_only must be an integer, got {v:?}"))),
    }
}

fn validated_name(payload: AttrPayload) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    validate::text(&mut errors, "name", payload.name, true).ok_or(ApiError::Validation(errors))
}

#[instrument(skip(state, user))]
pub async fn list_attrs(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    Query(query): Query<AttrQuery>,
) -> Result<Json<Vec<AttrResponse>>, ApiError> {
    let assigned_only = parse_flag(query.assigned_only.as_deref())?;
    let rows = state.store.list_attrs(kind, user.id, assigned_only).await?;
    Ok(Json(rows.into_iter().map(AttrResponse::from).collect()))
}

#[instrument(skip(state, user, payload))]
pub async fn create_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<AttrPayload>,
) -> Result<(StatusCode, Json<AttrResponse>), ApiError> {
    let name = validated_name(payload)?;
    let attr = state.store.insert_attr(kind, user.id, &name).await?;
    info!(?kind, id = attr.id, user_id = %user.id, "created");
    Ok((StatusCode::CREATED, Json(attr.into())))
}

#[instrument(skip(state, user))]
pub async fn get_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<AttrResponse>, ApiError> {
    let attr = state
        .store
        .get_attr(kind, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(attr.into()))
}

#[instrument(skip(state, user, payload))]
pub async fn put_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<AttrPayload>,
) -> Result<Json<AttrResponse>, ApiError> {
    update_attr(&state, kind, user.id, id, payload, false).await
}

#[instrument(skip(state, user, payload))]
pub async fn patch_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<AttrPayload>,
) -> Result<Json<AttrResponse>, ApiError> {
    update_attr(&state, kind, user.id, id, payload, true).await
}

/// `name` is the only writable field; a partial update without it is a no-op.
async fn update_attr(
    state: &AppState,
    kind: AttrKind,
    owner: Uuid,
    id: i64,
    payload: AttrPayload,
    partial: bool,
) -> Result<Json<AttrResponse>, ApiError> {
    let existing = state
        .store
        .get_attr(kind, owner, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if partial && payload.name.is_none() {
        return Ok(Json(existing.into()));
    }
    let name = validated_name(payload)?;
    let attr = state
        .store
        .update_attr(kind, owner, id, &name)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(attr.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_attr(kind, user.id, id).await? {
        return Err(ApiError::NotFound);
    }
    info!(?kind, id, user_id = %user.id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
