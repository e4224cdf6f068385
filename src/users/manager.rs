use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::{hash_password, verify_dummy, verify_password, HashError},
    db::{NewUser, Store, StoreError, User, UserChanges},
};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("users must have an email address")]
    EmptyEmail,

    #[error("user with this email already exists")]
    EmailTaken,

    #[error("password hashing failed: {0}")]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UserError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => UserError::EmailTaken,
            other => UserError::Store(other),
        }
    }
}

/// Optional columns set at creation time.
#[derive(Debug, Clone, Default)]
pub struct ExtraFields {
    pub name: String,
}

/// Profile fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lowercases the domain part of an address, leaving the local part intact.
pub fn normalize_email(email: &str) -> String {
    let trimmed = email.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

/// Creates and authenticates accounts on top of a [`Store`].
pub struct UserManager<'a> {
    store: &'a dyn Store,
}

impl<'a> UserManager<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        extra: ExtraFields,
    ) -> Result<User, UserError> {
        self.create(email, password, extra, false).await
    }

    pub async fn create_superuser(
        &self,
        email: &str,
        password: &str,
        extra: ExtraFields,
    ) -> Result<User, UserError> {
        self.create(email, password, extra, true).await
    }

    async fn create(
        &self,
        email: &str,
        password: &str,
        extra: ExtraFields,
        superuser: bool,
    ) -> Result<User, UserError> {
        if email.trim().is_empty() {
            return Err(UserError::EmptyEmail);
        }
        let password_hash = hash_password(password)?;
        let user = self
            .store
            .insert_user(NewUser {
                email: normalize_email(email),
                name: extra.name,
                password_hash,
                is_staff: superuser,
                is_superuser: superuser,
            })
            .await?;
        info!(user_id = %user.id, email = %user.email, superuser, "user created");
        Ok(user)
    }

    /// The active user owning `email` whose password matches, if any.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, UserError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            verify_dummy(password);
            warn!(email = %email, "login unknown email");
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Ok(None);
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login inactive user");
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Applies `changes` to the account `id`, normalizing the email and
    /// re-hashing a new password. `None` when the account is gone.
    pub async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<User>, UserError> {
        let password_hash = changes.password.as_deref().map(hash_password).transpose()?;
        let updated = self
            .store
            .update_user(
                id,
                UserChanges {
                    email: changes.email.as_deref().map(normalize_email),
                    name: changes.name,
                    password_hash,
                },
            )
            .await?;
        if let Some(user) = &updated {
            info!(user_id = %user.id, "profile updated");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod manager_tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    #[test]
    fn normalize_lowercases_domain_only() {
        assert_eq!(normalize_email("test@MAIL.COM"), "test@mail.com");
        assert_eq!(normalize_email("Test.User@Mail.Com"), "Test.User@mail.com");
        assert_eq!(normalize_email("  a@B.io "), "a@b.io");
        assert_eq!(normalize_email("we\"ird@x@EXAMPLE.org"), "we\"ird@x@example.org");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
        assert_eq!(normalize_email("  noat  "), "noat");
    }

    #[tokio::test]
    async fn create_user_with_email_successful() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        let user = manager
            .create_user("test@mail.com", "Testpass123", ExtraFields::default())
            .await
            .unwrap();
        assert_eq!(user.email, "test@mail.com");
        assert!(verify_password("Testpass123", &user.password_hash).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[tokio::test]
    async fn new_user_email_normalized() {
        let store = MemoryStore::new();
        let user = UserManager::new(&store)
            .create_user("test@MAIL.COM", "test123", ExtraFields::default())
            .await
            .unwrap();
        assert_eq!(user.email, "test@mail.com");
    }

    #[tokio::test]
    async fn empty_email_is_rejected() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        for email in ["", "   "] {
            let err = manager
                .create_user(email, "test123", ExtraFields::default())
                .await
                .unwrap_err();
            assert!(matches!(err, UserError::EmptyEmail));
        }
    }

    #[tokio::test]
    async fn create_new_superuser() {
        let store = MemoryStore::new();
        let user = UserManager::new(&store)
            .create_superuser("test@mail.com", "test123", ExtraFields::default())
            .await
            .unwrap();
        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn duplicate_email_is_taken() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        manager
            .create_user("dup@mail.com", "test123", ExtraFields::default())
            .await
            .unwrap();
        let err = manager
            .create_user("dup@MAIL.com", "test123", ExtraFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        let created = manager
            .create_user("admin@mail.ru", "Admin123", ExtraFields::default())
            .await
            .unwrap();

        let found = manager.authenticate("admin@MAIL.ru", "Admin123").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
        assert!(manager.authenticate("admin@mail.ru", "wrong").await.unwrap().is_none());
        assert!(manager.authenticate("nobody@mail.ru", "Admin123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_profile_rehashes_and_normalizes() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        let user = manager
            .create_user("old@mail.com", "Oldpass123", ExtraFields::default())
            .await
            .unwrap();

        let updated = manager
            .update_profile(
                user.id,
                ProfileChanges {
                    email: Some("New@MAIL.com".into()),
                    password: Some("Newpass123".into()),
                    ..ProfileChanges::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.email, "New@mail.com");
        assert!(verify_password("Newpass123", &updated.password_hash).unwrap());
        assert!(!verify_password("Oldpass123", &updated.password_hash).unwrap());
    }

    #[tokio::test]
    async fn update_profile_reports_taken_email() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        manager
            .create_user("taken@mail.com", "test1234", ExtraFields::default())
            .await
            .unwrap();
        let user = manager
            .create_user("me@mail.com", "test1234", ExtraFields::default())
            .await
            .unwrap();

        let err = manager
            .update_profile(
                user.id,
                ProfileChanges {
                    email: Some("taken@mail.com".into()),
                    ..ProfileChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn inactive_user_cannot_authenticate() {
        let store = MemoryStore::new();
        let manager = UserManager::new(&store);
        let user = manager
            .create_user("gone@mail.com", "Admin123", ExtraFields::default())
            .await
            .unwrap();
        store.set_active(user.id, false);

        assert!(manager.authenticate("gone@mail.com", "Admin123").await.unwrap().is_none());
    }
}
