mod attrs;
mod dto;
pub mod handlers;
pub mod images;

use crate::{db::AttrKind, state::AppState};
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(attrs::attr_routes(AttrKind::Tag, "/api/recipe/tags/"))
        .merge(attrs::attr_routes(AttrKind::Ingredient, "/api/recipe/ingredients/"))
        .merge(handlers::recipe_routes())
}
