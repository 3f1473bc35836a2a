use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use academyerp_auth::{Identity, IdentityStore, Role, StoreError};
use academyerp_core::Email;

/// In-memory identity store.
///
/// Intended for tests/dev. The conditional activation write happens under
/// the write lock, so concurrent activations for one email have one winner.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    people: RwLock<HashMap<Email, Identity>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let people = identities
            .into_iter()
            .map(|identity| (identity.email.clone(), identity))
            .collect();
        Self {
            people: RwLock::new(people),
        }
    }

    /// Insert or replace an identity (stands in for external provisioning).
    pub fn provision(&self, identity: Identity) -> Result<(), StoreError> {
        let mut people = self.write()?;
        people.insert(identity.email.clone(), identity);
        Ok(())
    }

    /// Replace the role set of an existing identity.
    pub fn set_roles(&self, email: &Email, roles: Vec<Role>) -> Result<(), StoreError> {
        let mut people = self.write()?;
        let identity = people.get_mut(email).ok_or(StoreError::NotFound)?;
        identity.roles = roles;
        Ok(())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Email, Identity>>, StoreError> {
        self.people
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Email, Identity>>, StoreError> {
        self.people
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Identity>, StoreError> {
        Ok(self.read()?.get(email).cloned())
    }

    async fn set_password_hash_if_absent(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut people = self.write()?;
        let identity = people.get_mut(email).ok_or(StoreError::NotFound)?;

        if identity.password_hash.is_some() {
            return Err(StoreError::Conflict(format!(
                "password already set for {email}"
            )));
        }

        identity.password_hash = Some(password_hash.to_string());
        Ok(())
    }

    async fn load_roles(&self, email: &Email) -> Result<Vec<Role>, StoreError> {
        self.read()?
            .get(email)
            .map(|identity| identity.roles.clone())
            .ok_or(StoreError::NotFound)
    }
}
