//! Credential-based (email + password) login records.

mod store;
mod types;

pub use store::EmailPasswordStore;
pub use types::{EmailPasswordUser, PasswordResetToken, PasswordResetTokenKey};
