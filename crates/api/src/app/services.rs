//! Service graph wiring: identity store, password hashing, token issuance.

use std::sync::Arc;

use academyerp_auth::{
    AccountService, Argon2Verifier, Hs256JwtValidator, Hs256TokenIssuer, IdentityStore,
    JwtValidator, PasswordError, StoreRoleResolver,
};
use academyerp_infra::{AppConfig, InMemoryIdentityStore, PostgresIdentityStore};

/// Shared state behind every handler.
pub struct AppServices {
    pub accounts: AccountService,
    pub jwt: Arc<dyn JwtValidator>,
}

impl AppServices {
    /// Wire the account service over an already constructed store.
    pub fn new(store: Arc<dyn IdentityStore>, config: &AppConfig) -> Result<Self, PasswordError> {
        let verifier = Arc::new(Argon2Verifier::new(&config.password)?);
        let issuer = Arc::new(Hs256TokenIssuer::new(
            &config.signing_key,
            config.token.clone(),
        ));
        let roles = Arc::new(StoreRoleResolver::new(store.clone()));

        Ok(Self {
            accounts: AccountService::new(store, roles, verifier, issuer),
            jwt: Arc::new(Hs256JwtValidator::new(&config.signing_key, &config.token)),
        })
    }
}

/// Build services from process configuration.
///
/// Uses Postgres when `database_url` is set, otherwise an empty in-memory store.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn IdentityStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresIdentityStore::connect(url).await?;
            store.ensure_schema().await?;
            tracing::info!("identity store: postgres");
            Arc::new(store)
        }
        None => {
            tracing::warn!(
                "ERP_DATABASE_URL not set; using in-memory identity store (no identities are provisioned)"
            );
            Arc::new(InMemoryIdentityStore::new())
        }
    };

    Ok(AppServices::new(store, config)?)
}
