//! Permission System
//!
//! Closed sets of permissions and roles, and the two immutable lookup tables
//! built once at startup: role → permissions and tool → accepted permissions.

use super::identity::AuthenticatedUser;
use crate::tools::names;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Specific permissions that can be granted to callers
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:todos")]
    ReadTodos,
    #[serde(rename = "create:todos")]
    CreateTodos,
    #[serde(rename = "update:todos")]
    UpdateTodos,
    #[serde(rename = "delete:todos")]
    DeleteTodos,
    #[serde(rename = "list:tools")]
    ListTools,
    #[serde(rename = "call:tools")]
    CallTools,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ReadTodos,
        Permission::CreateTodos,
        Permission::UpdateTodos,
        Permission::DeleteTodos,
        Permission::ListTools,
        Permission::CallTools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadTodos => "read:todos",
            Permission::CreateTodos => "create:todos",
            Permission::UpdateTodos => "update:todos",
            Permission::DeleteTodos => "delete:todos",
            Permission::ListTools => "list:tools",
            Permission::CallTools => "call:tools",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// Named bundle of permissions assigned to a caller
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Readonly,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Readonly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Readonly => "readonly",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "readonly" => Ok(Role::Readonly),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Immutable role and tool permission tables
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it after
/// construction.
#[derive(Debug, Clone)]
pub struct PermissionModel {
    role_permissions: HashMap<Role, BTreeSet<Permission>>,
    tool_permissions: HashMap<String, BTreeSet<Permission>>,
}

impl PermissionModel {
    /// Create a model from explicit tables
    pub fn new(
        role_permissions: HashMap<Role, BTreeSet<Permission>>,
        tool_permissions: HashMap<String, BTreeSet<Permission>>,
    ) -> Self {
        Self {
            role_permissions,
            tool_permissions,
        }
    }

    /// The tables served by the TODO tool server
    pub fn standard() -> Self {
        use Permission::*;

        let role_permissions = HashMap::from([
            (
                Role::Admin,
                BTreeSet::from([
                    ReadTodos,
                    CreateTodos,
                    UpdateTodos,
                    DeleteTodos,
                    ListTools,
                    CallTools,
                ]),
            ),
            (
                Role::User,
                BTreeSet::from([ReadTodos, CreateTodos, UpdateTodos, ListTools, CallTools]),
            ),
            (Role::Readonly, BTreeSet::from([ReadTodos, ListTools])),
        ]);

        let tool_permissions = [
            (names::ADD_TODO, CreateTodos),
            (names::LIST_TODOS, ReadTodos),
            (names::COMPLETE_TODO, UpdateTodos),
            (names::DELETE_TODO, DeleteTodos),
            (names::UPDATE_TODO_TEXT, UpdateTodos),
        ]
        .into_iter()
        .map(|(tool, permission)| (tool.to_string(), BTreeSet::from([permission])))
        .collect();

        Self::new(role_permissions, tool_permissions)
    }

    /// Permissions granted by a role; a role missing from the table grants nothing
    pub fn permissions_for_role(&self, role: Role) -> BTreeSet<Permission> {
        self.role_permissions.get(&role).cloned().unwrap_or_default()
    }

    /// The permission set that applies to a caller
    ///
    /// An explicit grant on the identity replaces the role-derived set, even
    /// when it is narrower.
    pub fn effective_permissions(&self, user: &AuthenticatedUser) -> BTreeSet<Permission> {
        match &user.permissions {
            Some(explicit) => explicit.clone(),
            None => self.permissions_for_role(user.role),
        }
    }

    /// Check if a caller holds a specific permission
    pub fn has_permission(&self, user: &AuthenticatedUser, permission: Permission) -> bool {
        match &user.permissions {
            Some(explicit) => explicit.contains(&permission),
            None => self
                .role_permissions
                .get(&user.role)
                .is_some_and(|granted| granted.contains(&permission)),
        }
    }

    /// Whether the caller holds at least one of `required`; false for an empty set
    pub fn has_any_permission(
        &self,
        user: &AuthenticatedUser,
        required: &BTreeSet<Permission>,
    ) -> bool {
        required
            .iter()
            .any(|permission| self.has_permission(user, *permission))
    }

    /// Permissions accepted for a tool, or `None` when the tool is unknown
    pub fn required_permissions_for_tool(&self, tool_name: &str) -> Option<&BTreeSet<Permission>> {
        self.tool_permissions.get(tool_name)
    }

    /// Sorted names of every tool in the table
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tool_permissions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Ordered copy of the role table
    pub fn role_table(&self) -> BTreeMap<Role, BTreeSet<Permission>> {
        self.role_permissions
            .iter()
            .map(|(role, permissions)| (*role, permissions.clone()))
            .collect()
    }

    /// Ordered copy of the tool table
    pub fn tool_table(&self) -> BTreeMap<String, BTreeSet<Permission>> {
        self.tool_permissions
            .iter()
            .map(|(tool, permissions)| (tool.clone(), permissions.clone()))
            .collect()
    }
}

impl Default for PermissionModel {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser::new("u-1", role)
    }

    #[test]
    fn test_role_tables_are_nested() {
        let model = PermissionModel::standard();
        let admin = model.permissions_for_role(Role::Admin);
        let user = model.permissions_for_role(Role::User);
        let readonly = model.permissions_for_role(Role::Readonly);

        assert!(admin.is_superset(&user));
        assert!(user.is_superset(&readonly));
        assert_eq!(admin.len(), Permission::ALL.len());
        assert_eq!(
            readonly,
            BTreeSet::from([Permission::ReadTodos, Permission::ListTools])
        );
        assert!(!user.contains(&Permission::DeleteTodos));
    }

    #[test]
    fn test_role_lookup_is_deterministic() {
        let model = PermissionModel::standard();
        for role in Role::ALL {
            assert_eq!(model.permissions_for_role(role), model.permissions_for_role(role));
        }
    }

    #[test]
    fn test_missing_role_entry_grants_nothing() {
        let model = PermissionModel::new(HashMap::new(), HashMap::new());
        assert!(model.permissions_for_role(Role::Admin).is_empty());
        assert!(!model.has_permission(&user(Role::Admin), Permission::ReadTodos));
    }

    #[test]
    fn test_explicit_permissions_override_role() {
        let model = PermissionModel::standard();

        let narrowed = user(Role::Admin).with_permissions([Permission::ReadTodos]);
        assert!(model.has_permission(&narrowed, Permission::ReadTodos));
        assert!(!model.has_permission(&narrowed, Permission::DeleteTodos));

        let widened = user(Role::Readonly).with_permissions([Permission::DeleteTodos]);
        assert!(model.has_permission(&widened, Permission::DeleteTodos));
        assert!(!model.has_permission(&widened, Permission::ReadTodos));

        let empty = user(Role::Admin).with_permissions([]);
        assert!(!model.has_permission(&empty, Permission::ListTools));
    }

    #[test]
    fn test_tool_lookup() {
        let model = PermissionModel::standard();

        assert_eq!(
            model.required_permissions_for_tool(names::DELETE_TODO),
            Some(&BTreeSet::from([Permission::DeleteTodos]))
        );
        assert!(model.required_permissions_for_tool("drop_database").is_none());
        assert_eq!(model.tool_names().len(), 5);
    }

    #[test]
    fn test_empty_required_set_denies() {
        let model = PermissionModel::standard();
        assert!(!model.has_any_permission(&user(Role::Admin), &BTreeSet::new()));
    }

    #[test]
    fn test_permission_string_forms() {
        for permission in Permission::ALL {
            let parsed: Permission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, permission);
        }
        assert_eq!(
            serde_json::to_string(&Permission::UpdateTodos).unwrap(),
            "\"update:todos\""
        );
        assert!("update_todos".parse::<Permission>().is_err());
        assert_eq!("readonly".parse::<Role>().unwrap(), Role::Readonly);
        assert!("superuser".parse::<Role>().is_err());
    }
}
