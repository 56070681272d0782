//! Passwordless (OTP / magic link) login records.

mod store;
mod types;

pub use store::PasswordlessStore;
pub use types::{PasswordlessCode, PasswordlessDevice, PasswordlessUser};
