/// Composite key of a (role, permission) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RolePermissionKey {
    pub role: String,
    pub permission: String,
}

impl RolePermissionKey {
    pub fn new(role: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            permission: permission.into(),
        }
    }
}

/// Composite key of a (user, role) assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRoleKey {
    pub user_id: String,
    pub role: String,
}

impl UserRoleKey {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}
