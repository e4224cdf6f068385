use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AttrKind, NewUser, Recipe, RecipeAttr, RecipeDraft, RecipeFilter, Store, StoreError, User,
    UserChanges,
};

/// In-process [`Store`] backing the endpoint tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    attrs: BTreeMap<(AttrKind, i64), RecipeAttr>,
    recipes: BTreeMap<i64, Recipe>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn owned_ids(&self, kind: AttrKind, owner: Uuid, ids: &[i64]) -> Vec<i64> {
        let mut out: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| {
                self.attrs
                    .get(&(kind, *id))
                    .is_some_and(|a| a.user_id == owner)
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips `is_active`, which the SQL store only exposes through the database.
    pub fn set_active(&self, id: Uuid, active: bool) {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.is_active = active;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }
}

fn sort_by_name(rows: &mut [RecipeAttr]) {
    rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn links(recipe: &Recipe, kind: AttrKind) -> &[i64] {
    match kind {
        AttrKind::Tag => &recipe.tags,
        AttrKind::Ingredient => &recipe.ingredients,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.email_taken(&new.email, None) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            is_active: true,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        if let Some(email) = &changes.email {
            if inner.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("users_email_key".into()));
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn list_attrs(
        &self,
        kind: AttrKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<RecipeAttr>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<RecipeAttr> = inner
            .attrs
            .iter()
            .filter(|((k, _), a)| *k == kind && a.user_id == owner)
            .filter(|(_, a)| {
                !assigned_only || inner.recipes.values().any(|r| links(r, kind).contains(&a.id))
            })
            .map(|(_, a)| a.clone())
            .collect();
        sort_by_name(&mut rows);
        Ok(rows)
    }

    async fn get_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<Option<RecipeAttr>, StoreError> {
        Ok(self
            .lock()
            .attrs
            .get(&(kind, id))
            .filter(|a| a.user_id == owner)
            .cloned())
    }

    async fn attrs_by_ids(
        &self,
        kind: AttrKind,
        owner: Uuid,
        ids: &[i64],
    ) -> Result<Vec<RecipeAttr>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<RecipeAttr> = inner
            .owned_ids(kind, owner, ids)
            .into_iter()
            .filter_map(|id| inner.attrs.get(&(kind, id)).cloned())
            .collect();
        sort_by_name(&mut rows);
        Ok(rows)
    }

    async fn insert_attr(&self, kind: AttrKind, owner: Uuid, name: &str) -> Result<RecipeAttr, StoreError> {
        let mut inner = self.lock();
        let attr = RecipeAttr {
            id: inner.next_id(),
            user_id: owner,
            name: name.to_string(),
        };
        inner.attrs.insert((kind, attr.id), attr.clone());
        Ok(attr)
    }

    async fn update_attr(
        &self,
        kind: AttrKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<RecipeAttr>, StoreError> {
        let mut inner = self.lock();
        Ok(inner
            .attrs
            .get_mut(&(kind, id))
            .filter(|a| a.user_id == owner)
            .map(|a| {
                a.name = name.to_string();
                a.clone()
            }))
    }

    async fn delete_attr(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if !inner.attrs.get(&(kind, id)).is_some_and(|a| a.user_id == owner) {
            return Ok(false);
        }
        inner.attrs.remove(&(kind, id));
        for recipe in inner.recipes.values_mut() {
            match kind {
                AttrKind::Tag => recipe.tags.retain(|t| *t != id),
                AttrKind::Ingredient => recipe.ingredients.retain(|i| *i != id),
            }
        }
        Ok(true)
    }

    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>, StoreError> {
        let matches = |have: &[i64], want: &Option<Vec<i64>>| match want {
            Some(want) => want.iter().any(|id| have.contains(id)),
            None => true,
        };
        Ok(self
            .lock()
            .recipes
            .values()
            .rev()
            .filter(|r| r.user_id == owner)
            .filter(|r| matches(&r.tags, &filter.tags) && matches(&r.ingredients, &filter.ingredients))
            .cloned()
            .collect())
    }

    async fn get_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>, StoreError> {
        Ok(self
            .lock()
            .recipes
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned())
    }

    async fn insert_recipe(&self, owner: Uuid, draft: RecipeDraft) -> Result<Recipe, StoreError> {
        let mut inner = self.lock();
        let recipe = Recipe {
            id: inner.next_id(),
            user_id: owner,
            tags: inner.owned_ids(AttrKind::Tag, owner, &draft.tags),
            ingredients: inner.owned_ids(AttrKind::Ingredient, owner, &draft.ingredients),
            title: draft.title,
            time_minutes: draft.time_minutes,
            price: draft.price,
            link: draft.link,
            image: None,
        };
        inner.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        draft: RecipeDraft,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut inner = self.lock();
        let tags = inner.owned_ids(AttrKind::Tag, owner, &draft.tags);
        let ingredients = inner.owned_ids(AttrKind::Ingredient, owner, &draft.ingredients);
        Ok(inner
            .recipes
            .get_mut(&id)
            .filter(|r| r.user_id == owner)
            .map(|r| {
                r.title = draft.title;
                r.time_minutes = draft.time_minutes;
                r.price = draft.price;
                r.link = draft.link;
                r.tags = tags;
                r.ingredients = ingredients;
                r.clone()
            }))
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if !inner.recipes.get(&id).is_some_and(|r| r.user_id == owner) {
            return Ok(false);
        }
        inner.recipes.remove(&id);
        Ok(true)
    }

    async fn set_recipe_image(&self, owner: Uuid, id: i64, image: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.recipes.get_mut(&id).filter(|r| r.user_id == owner) {
            Some(r) => {
                r.image = Some(image.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
