//! authstore - Persistence layer for a multi-recipe authentication backend
//!
//! This crate stores and retrieves the records behind credential-based,
//! federated, and passwordless login, plus sessions, signing keys,
//! email-verification state, roles/permissions, user-id mappings, and user
//! metadata, all on a single PostgreSQL backend.
//!
//! Callers open a [`UnitOfWork`] via [`AuthStorage::begin`], compose any
//! number of repository calls against it, and commit or roll back. Locked
//! reads (`get_*_locked`) take row-level exclusive locks so read-modify-write
//! sequences are serialized across concurrent callers.

mod emailpassword;
mod emailverification;
mod keyvalue;
mod passwordless;
mod session;
mod signingkeys;
mod storage;
mod thirdparty;
mod useridmapping;
mod usermetadata;
mod userroles;
mod users;
mod utils;

pub use storage::{
    AuthStorage, PageBoundary, SortOrder, StorageConfig, StorageError, TableCatalog, UnitOfWork,
};

pub use emailpassword::{
    EmailPasswordStore, EmailPasswordUser, PasswordResetToken, PasswordResetTokenKey,
};
pub use emailverification::{
    EmailVerificationStore, EmailVerificationToken, EmailVerificationTokenKey, VerifiedEmailKey,
};
pub use keyvalue::{KeyValueEntry, KeyValueStore};
pub use passwordless::{
    PasswordlessCode, PasswordlessDevice, PasswordlessStore, PasswordlessUser,
};
pub use session::{SessionInfo, SessionStore};
pub use signingkeys::{AccessTokenSigningKey, JwtSigningKey, SigningKeyStore};
pub use thirdparty::{ThirdPartyStore, ThirdPartyUser};
pub use useridmapping::{UserIdMapping, UserIdMappingKey, UserIdMappingStore};
pub use usermetadata::{UserMetadata, UserMetadataStore};
pub use userroles::{RolePermissionKey, UserRoleKey, UserRolesStore};
pub use users::{AuthRecipeUser, RecipeId, UserStore};
