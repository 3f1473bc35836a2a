//! Account activation and login.
//!
//! Per-identity state machine:
//!
//! | State            | Activate                    | Login                          |
//! |------------------|-----------------------------|--------------------------------|
//! | unknown email    | `NotRegistered`             | `NotRegistered`                |
//! | pending          | set hash, issue token       | `InvalidCredentials`           |
//! | active           | `AlreadyActivated`          | verify → token / `InvalidCredentials` |
//!
//! Pending-login and wrong-password share one rejection, so the response
//! does not reveal which of the two happened.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use academyerp_core::Email;

use crate::{
    CredentialVerifier, Identity, IdentityState, IdentityStore, IssuedToken, PasswordError,
    RoleResolver, StoreError, TokenError, TokenIssuer,
};

// ─────────────────────────────────────────────────────────────────────────────
// Request + errors
// ─────────────────────────────────────────────────────────────────────────────

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email not registered. Please contact with admin responsible")]
    NotRegistered,

    #[error("User already registered. Please sign in")]
    AlreadyActivated,

    #[error("Invalid login attempt.")]
    InvalidCredentials,

    #[error("malformed request")]
    MalformedRequest(Vec<FieldError>),

    #[error("identity store failure")]
    Store(#[source] StoreError),

    #[error("password hashing failure")]
    Hashing(#[source] PasswordError),

    #[error("token issuance failure")]
    Token(#[source] TokenError),
}

/// Email + password pair, validated for shape.
#[derive(Clone)]
pub struct Credentials {
    pub email: Email,
    password: String,
}

impl Credentials {
    pub fn parse(email: &str, password: &str) -> Result<Self, AccountError> {
        let mut errors = Vec::new();

        let email = match Email::parse(email) {
            Ok(email) => Some(email),
            Err(_) => {
                errors.push(FieldError::new("email", "The Email field is not a valid e-mail address."));
                None
            }
        };
        if password.trim().is_empty() {
            errors.push(FieldError::new("password", "The Password field is required."));
        }

        match email {
            Some(email) if errors.is_empty() => Ok(Self {
                email,
                password: password.to_string(),
            }),
            _ => Err(AccountError::MalformedRequest(errors)),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrates activation and login over explicitly supplied collaborators.
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
    roles: Arc<dyn RoleResolver>,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        roles: Arc<dyn RoleResolver>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            roles,
            verifier,
            tokens,
        }
    }

    /// First-time password establishment for a pending identity.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn activate(&self, credentials: &Credentials) -> Result<IssuedToken, AccountError> {
        let identity = self.load(&credentials.email).await?;

        if identity.state() == IdentityState::Active {
            tracing::info!("activation rejected: already active");
            return Err(AccountError::AlreadyActivated);
        }

        let hash = self.hash_password(credentials.password()).await?;

        // The pending check above is only advisory; the conditional write is
        // what serializes concurrent activations.
        match self
            .store
            .set_password_hash_if_absent(&identity.email, &hash)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                tracing::info!("activation rejected: lost concurrent activation");
                return Err(AccountError::AlreadyActivated);
            }
            Err(StoreError::NotFound) => return Err(AccountError::NotRegistered),
            Err(e) => return Err(AccountError::Store(e)),
        }

        tracing::info!("account activated");
        self.issue_for(&identity).await
    }

    /// Verify an existing password and issue a token.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<IssuedToken, AccountError> {
        let identity = self.load(&credentials.email).await?;

        // Pending identities are checked against the decoy hash so both
        // rejections take the same time.
        let matched = self
            .verify_password(identity.password_hash.as_deref(), credentials.password())
            .await?;

        if !matched {
            match identity.state() {
                IdentityState::Pending => tracing::info!("login rejected: account not activated"),
                IdentityState::Active => tracing::info!("login rejected: password mismatch"),
            }
            return Err(AccountError::InvalidCredentials);
        }

        self.issue_for(&identity).await
    }

    // Argon2 work runs on the blocking pool, off the async worker threads.
    async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let verifier = self.verifier.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AccountError::Hashing(PasswordError::Hashing(e.to_string())))?
            .map_err(AccountError::Hashing)
    }

    async fn verify_password(
        &self,
        password_hash: Option<&str>,
        candidate: &str,
    ) -> Result<bool, AccountError> {
        let verifier = self.verifier.clone();
        let password_hash = password_hash.map(str::to_string);
        let candidate = candidate.to_string();

        tokio::task::spawn_blocking(move || match password_hash {
            Some(hash) => verifier.verify(&hash, &candidate),
            None => {
                let _ = verifier.verify(verifier.decoy_hash(), &candidate);
                false
            }
        })
        .await
        .map_err(|e| AccountError::Hashing(PasswordError::Hashing(e.to_string())))
    }

    async fn load(&self, email: &Email) -> Result<Identity, AccountError> {
        match self.store.find_by_email(email).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                tracing::info!("rejected: email not registered");
                Err(AccountError::NotRegistered)
            }
            Err(e) => {
                tracing::error!(error = %e, "identity lookup failed");
                Err(AccountError::Store(e))
            }
        }
    }

    async fn issue_for(&self, identity: &Identity) -> Result<IssuedToken, AccountError> {
        let roles = self.roles.roles_of(identity).await.map_err(|e| {
            tracing::error!(error = %e, "role resolution failed");
            AccountError::Store(e)
        })?;

        let issued = self
            .tokens
            .issue(&identity.email, &identity.display_name(), &roles)
            .map_err(|e| {
                tracing::error!(error = %e, "token issuance failed");
                AccountError::Token(e)
            })?;

        tracing::info!(jti = %issued.jti, role_count = roles.len(), "access token issued");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::{
        Argon2Verifier, Hs256JwtValidator, Hs256TokenIssuer, JwtValidator, PasswordConfig, Role,
        SigningKey, StoreRoleResolver, TokenConfig,
    };

    const SECRET: &str = "account-tests-secret-with-enough-bytes";

    #[derive(Default)]
    struct FakeStore {
        people: Mutex<HashMap<Email, Identity>>,
    }

    impl FakeStore {
        fn with(identities: Vec<Identity>) -> Arc<Self> {
            let store = Self::default();
            {
                let mut people = store.people.lock().unwrap();
                for identity in identities {
                    people.insert(identity.email.clone(), identity);
                }
            }
            Arc::new(store)
        }

        fn hash_of(&self, email: &str) -> Option<String> {
            self.people.lock().unwrap()[&Email::parse(email).unwrap()]
                .password_hash
                .clone()
        }

        fn set_roles(&self, email: &str, roles: Vec<Role>) {
            let mut people = self.people.lock().unwrap();
            people.get_mut(&Email::parse(email).unwrap()).unwrap().roles = roles;
        }
    }

    #[async_trait]
    impl IdentityStore for FakeStore {
        async fn find_by_email(&self, email: &Email) -> Result<Option<Identity>, StoreError> {
            Ok(self.people.lock().unwrap().get(email).cloned())
        }

        async fn set_password_hash_if_absent(
            &self,
            email: &Email,
            password_hash: &str,
        ) -> Result<(), StoreError> {
            let mut people = self.people.lock().unwrap();
            let identity = people.get_mut(email).ok_or(StoreError::NotFound)?;
            if identity.password_hash.is_some() {
                return Err(StoreError::Conflict("password already set".to_string()));
            }
            identity.password_hash = Some(password_hash.to_string());
            Ok(())
        }

        async fn load_roles(&self, email: &Email) -> Result<Vec<Role>, StoreError> {
            self.people
                .lock()
                .unwrap()
                .get(email)
                .map(|i| i.roles.clone())
                .ok_or(StoreError::NotFound)
        }
    }

    fn verifier() -> Arc<Argon2Verifier> {
        Arc::new(
            Argon2Verifier::new(&PasswordConfig {
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                argon2_parallelism: 1,
            })
            .unwrap(),
        )
    }

    /// Records which hashes `verify` was asked to check.
    struct RecordingVerifier {
        inner: Argon2Verifier,
        checked: Mutex<Vec<String>>,
    }

    impl RecordingVerifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: Arc::unwrap_or_clone(verifier()),
                checked: Mutex::new(Vec::new()),
            })
        }

        fn checked(&self) -> Vec<String> {
            self.checked.lock().unwrap().clone()
        }
    }

    impl CredentialVerifier for RecordingVerifier {
        fn hash(&self, password: &str) -> Result<String, PasswordError> {
            self.inner.hash(password)
        }

        fn verify(&self, password_hash: &str, candidate: &str) -> bool {
            self.checked.lock().unwrap().push(password_hash.to_string());
            self.inner.verify(password_hash, candidate)
        }

        fn decoy_hash(&self) -> &str {
            self.inner.decoy_hash()
        }
    }

    fn service(store: Arc<FakeStore>) -> AccountService {
        service_with(store, verifier())
    }

    fn service_with(store: Arc<FakeStore>, verifier: Arc<dyn CredentialVerifier>) -> AccountService {
        let key = SigningKey::new(SECRET).unwrap();
        AccountService::new(
            store.clone(),
            Arc::new(StoreRoleResolver::new(store)),
            verifier,
            Arc::new(Hs256TokenIssuer::new(&key, TokenConfig::default())),
        )
    }

    fn validator() -> Hs256JwtValidator {
        Hs256JwtValidator::new(&SigningKey::new(SECRET).unwrap(), &TokenConfig::default())
    }

    fn pending(email: &str, roles: Vec<Role>) -> Identity {
        Identity::pending(Email::parse(email).unwrap(), "Ada", "Lovelace", roles)
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials::parse(email, password).unwrap()
    }

    #[test]
    fn credentials_report_every_bad_field() {
        let Err(AccountError::MalformedRequest(errors)) = Credentials::parse("nope", "") else {
            panic!("expected MalformedRequest");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password"]);
    }

    #[test]
    fn blank_password_is_required() {
        let Err(AccountError::MalformedRequest(errors)) = Credentials::parse("a@x.com", "   ") else {
            panic!("expected MalformedRequest");
        };
        assert_eq!(
            errors,
            vec![FieldError::new("password", "The Password field is required.")]
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", creds("a@x.com", "Secret123"));
        assert!(!rendered.contains("Secret123"));
    }

    #[tokio::test]
    async fn activate_pending_identity_issues_token_and_stores_hash() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = service(store.clone());

        let issued = svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();

        let claims = validator().validate(&issued.token).unwrap();
        assert_eq!(claims.unique_name, "a@x.com");
        assert_eq!(issued.user_name, "Ada Lovelace");
        assert_eq!(issued.expires_at - issued.issued_at, Duration::days(7));

        let hash = store.hash_of("a@x.com").expect("hash stored");
        assert!(verifier().verify(&hash, "Secret123"));
    }

    #[tokio::test]
    async fn second_activation_is_rejected() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = service(store.clone());

        svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();
        let first_hash = store.hash_of("a@x.com");

        let err = svc.activate(&creds("a@x.com", "Other456")).await.unwrap_err();
        assert!(matches!(err, AccountError::AlreadyActivated));
        assert_eq!(store.hash_of("a@x.com"), first_hash);
    }

    #[tokio::test]
    async fn unknown_email_is_not_registered_for_both_flows() {
        let svc = service(FakeStore::with(vec![]));

        let err = svc.activate(&creds("ghost@x.com", "Secret123")).await.unwrap_err();
        assert!(matches!(err, AccountError::NotRegistered));

        let err = svc.login(&creds("ghost@x.com", "Secret123")).await.unwrap_err();
        assert!(matches!(err, AccountError::NotRegistered));
    }

    #[tokio::test]
    async fn login_on_pending_identity_is_invalid_credentials() {
        let svc = service(FakeStore::with(vec![pending("a@x.com", vec![])]));

        let err = svc.login(&creds("a@x.com", "Secret123")).await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid login attempt.");
    }

    #[tokio::test]
    async fn pending_login_still_runs_a_full_verification() {
        let recorder = RecordingVerifier::new();
        let svc = service_with(
            FakeStore::with(vec![pending("a@x.com", vec![])]),
            recorder.clone(),
        );

        let err = svc.login(&creds("a@x.com", "Secret123")).await.unwrap_err();

        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(recorder.checked(), vec![recorder.decoy_hash().to_string()]);
    }

    #[tokio::test]
    async fn wrong_password_is_checked_against_the_stored_hash() {
        let recorder = RecordingVerifier::new();
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = service_with(store.clone(), recorder.clone());
        svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();

        let err = svc.login(&creds("a@x.com", "Wrong456")).await.unwrap_err();

        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(recorder.checked(), vec![store.hash_of("a@x.com").unwrap()]);
    }

    #[tokio::test]
    async fn login_with_correct_password_carries_roles() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![Role::admin()])]);
        let svc = service(store);
        svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();

        let issued = svc.login(&creds("A@X.com", "Secret123")).await.unwrap();

        assert!(issued.is_admin_user);
        let claims = validator().validate(&issued.token).unwrap();
        assert_eq!(claims.roles(), &[Role::admin()]);
    }

    #[tokio::test]
    async fn login_with_wrong_password_has_no_side_effect() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = service(store.clone());
        svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();
        let before = store.hash_of("a@x.com");

        let err = svc.login(&creds("a@x.com", "wrong")).await.unwrap_err();

        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(store.hash_of("a@x.com"), before);
    }

    #[tokio::test]
    async fn token_snapshots_roles_current_at_issuance() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = service(store.clone());

        let first = svc.activate(&creds("a@x.com", "Secret123")).await.unwrap();
        assert!(!first.is_admin_user);

        store.set_roles("a@x.com", vec![Role::admin(), Role::new("Instructor")]);
        let second = svc.login(&creds("a@x.com", "Secret123")).await.unwrap();

        assert!(second.is_admin_user);
        assert!(validator().validate(&first.token).unwrap().roles().is_empty());
        assert_eq!(validator().validate(&second.token).unwrap().roles().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_activations_have_exactly_one_winner() {
        let store = FakeStore::with(vec![pending("a@x.com", vec![])]);
        let svc = Arc::new(service(store));

        let mut handles = Vec::new();
        for i in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.activate(&creds("a@x.com", &format!("Secret{i}"))).await
            }));
        }

        let mut ok = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AccountError::AlreadyActivated) => already += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(already, 7);
    }
}
