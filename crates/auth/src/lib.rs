//! `academyerp-auth` — account activation, login and access-token issuance.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence is
//! reached through [`IdentityStore`], and every collaborator of
//! [`AccountService`] is passed in explicitly.

pub mod account;
pub mod claims;
pub mod identity;
pub mod password;
pub mod roles;
pub mod token;

pub use account::{AccountError, AccountService, Credentials, FieldError};
pub use claims::{RoleClaims, TokenClaims};
pub use identity::{Identity, IdentityState, IdentityStore, RoleResolver, StoreError, StoreRoleResolver};
pub use password::{Argon2Verifier, CredentialVerifier, PasswordConfig, PasswordError};
pub use roles::Role;
pub use token::{
    Hs256JwtValidator, Hs256TokenIssuer, IssuedToken, JwtValidator, SigningKey, TOKEN_LIFETIME_DAYS,
    TokenConfig, TokenError, TokenIssuer,
};
