//! Email-verification tokens and verified-email state.

mod store;
mod types;

pub use store::EmailVerificationStore;
pub use types::{EmailVerificationToken, EmailVerificationTokenKey, VerifiedEmailKey};
