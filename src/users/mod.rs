mod dto;
pub mod handlers;
pub mod manager;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
