use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::jwt::JwtKeys;
use crate::{
    error::{ApiError, FieldErrors, JsonBody},
    state::AppState,
    users::manager::UserManager,
};

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/api/user/token/", post(create_token))
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, "This field is required.");
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, "This field may not be blank.");
            None
        }
        Some(v) => Some(v),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", payload.email);
    let password = required(&mut errors, "password", payload.password);
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Validation(errors));
    };

    let Some(user) = UserManager::new(state.store.as_ref())
        .authenticate(&email, &password)
        .await?
    else {
        return Err(ApiError::Validation(FieldErrors::single(
            "non_field_errors",
            BAD_CREDENTIALS,
        )));
    };

    let token = JwtKeys::from(&state.config.jwt).sign(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}
