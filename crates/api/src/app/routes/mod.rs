pub mod account;
pub mod system;
