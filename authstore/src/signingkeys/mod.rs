//! JWT and access-token signing key records.

mod store;
mod types;

pub use store::SigningKeyStore;
pub use types::{AccessTokenSigningKey, JwtSigningKey};
