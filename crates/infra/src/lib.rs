//! Infrastructure layer: identity persistence and configuration.

pub mod config;
pub mod identity_store;

pub use config::{AppConfig, ConfigError};
pub use identity_store::{InMemoryIdentityStore, PostgresIdentityStore};
