use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{UserPayload, UserResponse},
    manager::{ExtraFields, ProfileChanges, UserError, UserManager},
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, FieldErrors, JsonBody},
    state::AppState,
    validate,
};

const EMAIL_TAKEN: &str = "user with this email already exists.";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/create/", post(create_user))
        .route("/api/user/me/", get(get_me).put(put_me).patch(patch_me))
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::EmptyEmail => {
                ApiError::Validation(FieldErrors::single("email", "This field may not be blank."))
            }
            UserError::EmailTaken => ApiError::Validation(FieldErrors::single("email", EMAIL_TAKEN)),
            UserError::Hash(e) => ApiError::Internal(e.into()),
            UserError::Store(e) => e.into(),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors = FieldErrors::new();
    let email = validate::email(&mut errors, "email", payload.email, true);
    let password = validate::password(&mut errors, "password", payload.password, true);
    let name = validate::text(&mut errors, "name", payload.name, true);
    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(ApiError::Validation(errors));
    };

    let user = UserManager::new(state.store.as_ref())
        .create_user(&email, &password, ExtraFields { name })
        .await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn put_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    update_me(&state, user.id, payload, true).await
}

#[instrument(skip_all)]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    update_me(&state, user.id, payload, false).await
}

async fn update_me(
    state: &AppState,
    user_id: uuid::Uuid,
    payload: UserPayload,
    full: bool,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let email = validate::email(&mut errors, "email", payload.email, full);
    let password = validate::password(&mut errors, "password", payload.password, full);
    let name = validate::text(&mut errors, "name", payload.name, full);
    errors.into_result()?;

    let updated = UserManager::new(state.store.as_ref())
        .update_profile(user_id, ProfileChanges { email, name, password })
        .await?
        .ok_or(ApiError::InvalidToken)?;
    Ok(Json(updated.into()))
}
