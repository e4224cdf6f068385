use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{Recipe, RecipeAttr};

#[derive(Debug, Default, Deserialize)]
pub struct AttrPayload {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AttrResponse {
    pub id: i64,
    pub name: String,
}

impl From<RecipeAttr> for AttrResponse {
    fn from(a: RecipeAttr) -> Self {
        Self { id: a.id, name: a.name }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AttrQuery {
    pub assigned_only: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// List form: related rows as ids.
#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl From<Recipe> for RecipeListItem {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            tags: r.tags,
            ingredients: r.ingredients,
        }
    }
}

/// Detail form: related rows nested, image as a URL.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<AttrResponse>,
    pub ingredients: Vec<AttrResponse>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: String,
}
