//! Roles, role permissions, and user-role assignments.

mod store;
mod types;

pub use store::UserRolesStore;
pub use types::{RolePermissionKey, UserRoleKey};
