use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Account record. The hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: OffsetDateTime,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Profile edits; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// Tags and ingredients share one shape and differ only in where they live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKind {
    Tag,
    Ingredient,
}

impl AttrKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            AttrKind::Tag => "tags",
            AttrKind::Ingredient => "ingredients",
        }
    }

    pub(crate) fn link_table(self) -> &'static str {
        match self {
            AttrKind::Tag => "recipe_tags",
            AttrKind::Ingredient => "recipe_ingredients",
        }
    }

    pub(crate) fn link_column(self) -> &'static str {
        match self {
            AttrKind::Tag => "tag_id",
            AttrKind::Ingredient => "ingredient_id",
        }
    }
}

/// A tag or an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RecipeAttr {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
}

impl fmt::Display for RecipeAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Storage key of the uploaded image.
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Full set of writable recipe columns, including link ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl From<Recipe> for RecipeDraft {
    fn from(r: Recipe) -> Self {
        Self {
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            tags: r.tags,
            ingredients: r.ingredients,
        }
    }
}

/// Recipes matching any of the listed tag ids and any of the listed ingredient ids.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// Persistence for the whole service. Every tag, ingredient and recipe call is
/// scoped by `owner`; rows of other users behave as if they did not exist.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Ordered by name, then id.
    async fn list_attrs(
        &self,
        kind: AttrKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<RecipeAttr>, StoreError>;
    async fn get_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<Option<RecipeAttr>, StoreError>;
    /// Owned rows among `ids`, ordered by name. Unknown or foreign ids are skipped.
    async fn attrs_by_ids(
        &self,
        kind: AttrKind,
        owner: Uuid,
        ids: &[i64],
    ) -> Result<Vec<RecipeAttr>, StoreError>;
    async fn insert_attr(&self, kind: AttrKind, owner: Uuid, name: &str) -> Result<RecipeAttr, StoreError>;
    async fn update_attr(
        &self,
        kind: AttrKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<RecipeAttr>, StoreError>;
    async fn delete_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<bool, StoreError>;

    /// Ordered by descending id.
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>, StoreError>;
    async fn get_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>, StoreError>;
    async fn insert_recipe(&self, owner: Uuid, draft: RecipeDraft) -> Result<Recipe, StoreError>;
    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        draft: RecipeDraft,
    ) -> Result<Option<Recipe>, StoreError>;
    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool, StoreError>;
    async fn set_recipe_image(&self, owner: Uuid, id: i64, image: &str) -> Result<bool, StoreError>;
}
