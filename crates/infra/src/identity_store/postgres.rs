//! Postgres-backed identity store.
//!
//! Schema lives in `migrations/0001_identity.sql`: `people` holds one row per
//! identity (email is stored normalized), `person_roles` holds role names.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Unavailable` |
//! | PoolClosed / Io / other | N/A | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tracing::instrument;

use academyerp_auth::{Identity, IdentityStore, Role, StoreError};
use academyerp_core::Email;

const SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

/// Postgres identity store.
///
/// Activation is a single conditional `UPDATE ... WHERE password_hash IS NULL`,
/// so the database serializes concurrent activations for the same email.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the identity tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn exists(&self, email: &Email) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM people WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists", e))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self), fields(email = %email), err)]
    async fn find_by_email(&self, email: &Email) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT email, first_name, last_name, password_hash
            FROM people
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored_email: String = row
            .try_get("email")
            .map_err(|e| map_sqlx_error("find_by_email", e))?;
        let email = Email::parse(&stored_email)
            .map_err(|e| StoreError::Unavailable(format!("stored email is invalid: {e}")))?;

        let roles = self.load_roles(&email).await?;

        Ok(Some(Identity {
            email,
            first_name: row
                .try_get("first_name")
                .map_err(|e| map_sqlx_error("find_by_email", e))?,
            last_name: row
                .try_get("last_name")
                .map_err(|e| map_sqlx_error("find_by_email", e))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| map_sqlx_error("find_by_email", e))?,
            roles,
        }))
    }

    #[instrument(skip(self, password_hash), fields(email = %email), err)]
    async fn set_password_hash_if_absent(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE people
            SET password_hash = $2
            WHERE email = $1 AND password_hash IS NULL
            "#,
        )
        .bind(email.as_str())
        .bind(password_hash)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_password_hash_if_absent", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        if self.exists(email).await? {
            Err(StoreError::Conflict(format!("password already set for {email}")))
        } else {
            Err(StoreError::NotFound)
        }
    }

    #[instrument(skip(self), fields(email = %email), err)]
    async fn load_roles(&self, email: &Email) -> Result<Vec<Role>, StoreError> {
        if !self.exists(email).await? {
            return Err(StoreError::NotFound);
        }

        let rows = sqlx::query("SELECT role FROM person_roles WHERE email = $1 ORDER BY role")
            .bind(email.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_roles", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("role")
                    .map(Role::from)
                    .map_err(|e| map_sqlx_error("load_roles", e))
            })
            .collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}
