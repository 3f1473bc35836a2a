//! Identity records and the storage seam they are read through.
//!
//! Identities are provisioned outside this crate (email, name, roles). The
//! only mutation performed here is the one-way activation that sets the
//! password hash.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use academyerp_core::Email;

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Activation state derived from the presence of a password hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// Provisioned, no password set yet.
    Pending,
    /// Password set; can log in.
    Active,
}

/// A person eligible to authenticate, keyed by email.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: Option<String>,
    pub roles: Vec<Role>,
}

impl Identity {
    /// A freshly provisioned identity (no password yet).
    pub fn pending(
        email: Email,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        roles: Vec<Role>,
    ) -> Self {
        Self {
            email,
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: None,
            roles,
        }
    }

    pub fn state(&self) -> IdentityState {
        match self.password_hash {
            Some(_) => IdentityState::Active,
            None => IdentityState::Pending,
        }
    }

    /// "First Last", used only for display in token responses.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// Keeps the password hash out of logs and panic messages.
impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("state", &self.state())
            .field("roles", &self.roles)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Identity store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A conditional write found its precondition no longer holds.
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("identity not found")]
    NotFound,

    /// Connection, query or lock failure in the backing store.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent identity records, keyed by normalized email.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Identity>, StoreError>;

    /// Set the password hash only if none is stored yet.
    ///
    /// Must be atomic with respect to concurrent callers for the same email:
    /// at most one caller succeeds, the others get [`StoreError::Conflict`].
    async fn set_password_hash_if_absent(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    /// Current role names of an identity. Unknown emails yield `NotFound`.
    async fn load_roles(&self, email: &Email) -> Result<Vec<Role>, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Role resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves the roles to embed in a token for an identity.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn roles_of(&self, identity: &Identity) -> Result<Vec<Role>, StoreError>;
}

/// Reads roles straight from the identity store on every call (no caching),
/// so a token always snapshots the store's current state.
pub struct StoreRoleResolver {
    store: Arc<dyn IdentityStore>,
}

impl StoreRoleResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RoleResolver for StoreRoleResolver {
    async fn roles_of(&self, identity: &Identity) -> Result<Vec<Role>, StoreError> {
        self.store.load_roles(&identity.email).await
    }
}
