use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AttrKind, NewUser, Recipe, RecipeAttr, RecipeDraft, RecipeFilter, Store, StoreError, User,
    UserChanges,
};

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, created_at";

const RECIPE_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.title, r.time_minutes, r.price, r.link, r.image,
           ARRAY(SELECT rt.tag_id FROM recipe_tags rt
                  WHERE rt.recipe_id = r.id ORDER BY rt.tag_id) AS tags,
           ARRAY(SELECT ri.ingredient_id FROM recipe_ingredients ri
                  WHERE ri.recipe_id = r.id ORDER BY ri.ingredient_id) AS ingredients
      FROM recipes r
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects, retrying once a second while the database is still starting up.
    pub async fn connect(url: &str, max_connections: u32, attempts: u32) -> anyhow::Result<Self> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!(attempt, "database available");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < attempts => {
                    warn!(error = %e, attempt, attempts, "database unavailable, waiting 1 second");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e).context("connect to database"),
            }
        }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(e)
}

async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    kind: AttrKind,
    recipe_id: i64,
    ids: &[i64],
) -> Result<(), StoreError> {
    let (table, column) = (kind.link_table(), kind.link_column());
    sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    if !ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {table} (recipe_id, {column})
             SELECT $1, UNNEST($2::bigint[])
             ON CONFLICT DO NOTHING"
        ))
        .bind(recipe_id)
        .bind(ids)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn sorted_unique(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   name = COALESCE($3, name),
                   password_hash = COALESCE($4, password_hash)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn list_attrs(
        &self,
        kind: AttrKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<RecipeAttr>, StoreError> {
        let (table, link, column) = (kind.table(), kind.link_table(), kind.link_column());
        let rows = sqlx::query_as::<_, RecipeAttr>(&format!(
            r#"
            SELECT a.id, a.user_id, a.name
              FROM {table} a
             WHERE a.user_id = $1
               AND (NOT $2 OR EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = a.id))
             ORDER BY a.name, a.id
            "#
        ))
        .bind(owner)
        .bind(assigned_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<Option<RecipeAttr>, StoreError> {
        let row = sqlx::query_as::<_, RecipeAttr>(&format!(
            "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn attrs_by_ids(
        &self,
        kind: AttrKind,
        owner: Uuid,
        ids: &[i64],
    ) -> Result<Vec<RecipeAttr>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, RecipeAttr>(&format!(
            r#"
            SELECT id, user_id, name FROM {}
             WHERE user_id = $1 AND id = ANY($2)
             ORDER BY name, id
            "#,
            kind.table()
        ))
        .bind(owner)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_attr(&self, kind: AttrKind, owner: Uuid, name: &str) -> Result<RecipeAttr, StoreError> {
        let row = sqlx::query_as::<_, RecipeAttr>(&format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
            kind.table()
        ))
        .bind(owner)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_attr(
        &self,
        kind: AttrKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<RecipeAttr>, StoreError> {
        let row = sqlx::query_as::<_, RecipeAttr>(&format!(
            r#"
            UPDATE {} SET name = $3
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name
            "#,
            kind.table()
        ))
        .bind(id)
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let done = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>, StoreError> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            {RECIPE_SELECT}
             WHERE r.user_id = $1
               AND ($2::bigint[] IS NULL OR EXISTS (
                     SELECT 1 FROM recipe_tags rt WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
               AND ($3::bigint[] IS NULL OR EXISTS (
                     SELECT 1 FROM recipe_ingredients ri WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
             ORDER BY r.id DESC
            "#
        ))
        .bind(owner)
        .bind(filter.tags.as_deref())
        .bind(filter.ingredients.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>, StoreError> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "{RECIPE_SELECT} WHERE r.id = $1 AND r.user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_recipe(&self, owner: Uuid, draft: RecipeDraft) -> Result<Recipe, StoreError> {
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .bind(&draft.link)
        .fetch_one(&mut *tx)
        .await?;
        replace_links(&mut tx, AttrKind::Tag, id, &draft.tags).await?;
        replace_links(&mut tx, AttrKind::Ingredient, id, &draft.ingredients).await?;
        tx.commit().await?;

        Ok(Recipe {
            id,
            user_id: owner,
            tags: sorted_unique(&draft.tags),
            ingredients: sorted_unique(&draft.ingredients),
            title: draft.title,
            time_minutes: draft.time_minutes,
            price: draft.price,
            link: draft.link,
            image: None,
        })
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        draft: RecipeDraft,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            UPDATE recipes
               SET title = $3, time_minutes = $4, price = $5, link = $6
             WHERE id = $1 AND user_id = $2
            RETURNING image
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .bind(&draft.link)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((image,)) = updated else {
            return Ok(None);
        };
        replace_links(&mut tx, AttrKind::Tag, id, &draft.tags).await?;
        replace_links(&mut tx, AttrKind::Ingredient, id, &draft.ingredients).await?;
        tx.commit().await?;

        Ok(Some(Recipe {
            id,
            user_id: owner,
            tags: sorted_unique(&draft.tags),
            ingredients: sorted_unique(&draft.ingredients),
            title: draft.title,
            time_minutes: draft.time_minutes,
            price: draft.price,
            link: draft.link,
            image,
        }))
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn set_recipe_image(&self, owner: Uuid, id: i64, image: &str) -> Result<bool, StoreError> {
        let done = sqlx::query("UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
