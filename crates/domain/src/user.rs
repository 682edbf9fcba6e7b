//! User lookup and registration.

use std::sync::Arc;

use common::{IdGenerator, User, UserId};
use store::{StoreError, UserStore};
use tracing::info;

use crate::error::{DomainError, Result};

/// Resolves and registers users.
///
/// Registration is used for seeding and tests; the HTTP surface only ever
/// resolves existing users.
#[derive(Clone)]
pub struct UserDirectory<S> {
    store: S,
    ids: Arc<dyn IdGenerator>,
}

impl<S: UserStore> UserDirectory<S> {
    pub fn new(store: S, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Returns the user with the given id, or `NotFound`.
    pub async fn resolve(&self, id: &UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }

    /// Registers a new user with a freshly minted id.
    ///
    /// Fails with `Conflict` if the email is already taken.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, name: &str, email: &str) -> Result<User> {
        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "a user with email {email} already exists"
            )));
        }

        let user = User::new(UserId::mint(self.ids.as_ref()), name, email);
        let user = match self.store.insert_user(user).await {
            Ok(user) => user,
            // Lost the race against a concurrent registration.
            Err(StoreError::Duplicate { .. }) => {
                return Err(DomainError::Conflict(format!(
                    "a user with email {email} already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "registered user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::RandomIds;
    use store::InMemoryStore;

    fn directory() -> UserDirectory<InMemoryStore> {
        UserDirectory::new(InMemoryStore::new(), Arc::new(RandomIds))
    }

    #[tokio::test]
    async fn register_then_resolve() {
        let directory = directory();
        let user = directory.register("Alice", "alice@example.com").await.unwrap();
        assert!(user.id.as_str().starts_with("user-"));

        let resolved = directory.resolve(&user.id).await.unwrap();
        assert_eq!(resolved.email, "alice@example.com");
    }

    #[tokio::test]
    async fn resolve_unknown_user_is_not_found() {
        let directory = directory();
        let result = directory.resolve(&UserId::new("user-missing")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let directory = directory();
        directory.register("Alice", "a@example.com").await.unwrap();

        let result = directory.register("Alex", "a@example.com").await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }
}
