//! `IdentityStore` adapters.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
