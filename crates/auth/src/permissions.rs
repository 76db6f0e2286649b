use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roles::{LegacyRole, RoleType, UserRole};

/// Reach of a reporting/feedback permission.
///
/// Variants are declared narrowest first, so the derived `Ord` is the scope
/// lattice: `Individual < Community < Generation < School < Network < Global`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Individual,
    Community,
    Generation,
    School,
    Network,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Individual => "individual",
            Scope::Community => "community",
            Scope::Generation => "generation",
            Scope::School => "school",
            Scope::Network => "network",
            Scope::Global => "global",
        }
    }

    /// A scope counts as a granted permission unless it is the most restrictive one.
    pub fn is_granted(&self) -> bool {
        *self != Scope::Individual
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a field of [`RolePermissions`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKey {
    CanCreateCourses,
    CanEditAllCourses,
    CanDeleteCourses,
    CanAssignCourses,
    CanCreateUsers,
    CanEditUsers,
    CanDeleteUsers,
    CanAssignRoles,
    CanManageSchools,
    CanManageGenerations,
    CanManageCommunities,
    ReportingScope,
    FeedbackScope,
}

impl PermissionKey {
    pub const ALL: [PermissionKey; 13] = [
        PermissionKey::CanCreateCourses,
        PermissionKey::CanEditAllCourses,
        PermissionKey::CanDeleteCourses,
        PermissionKey::CanAssignCourses,
        PermissionKey::CanCreateUsers,
        PermissionKey::CanEditUsers,
        PermissionKey::CanDeleteUsers,
        PermissionKey::CanAssignRoles,
        PermissionKey::CanManageSchools,
        PermissionKey::CanManageGenerations,
        PermissionKey::CanManageCommunities,
        PermissionKey::ReportingScope,
        PermissionKey::FeedbackScope,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKey::CanCreateCourses => "can_create_courses",
            PermissionKey::CanEditAllCourses => "can_edit_all_courses",
            PermissionKey::CanDeleteCourses => "can_delete_courses",
            PermissionKey::CanAssignCourses => "can_assign_courses",
            PermissionKey::CanCreateUsers => "can_create_users",
            PermissionKey::CanEditUsers => "can_edit_users",
            PermissionKey::CanDeleteUsers => "can_delete_users",
            PermissionKey::CanAssignRoles => "can_assign_roles",
            PermissionKey::CanManageSchools => "can_manage_schools",
            PermissionKey::CanManageGenerations => "can_manage_generations",
            PermissionKey::CanManageCommunities => "can_manage_communities",
            PermissionKey::ReportingScope => "reporting_scope",
            PermissionKey::FeedbackScope => "feedback_scope",
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self, PermissionKey::ReportingScope | PermissionKey::FeedbackScope)
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for PermissionKey {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Effective permissions of a user, derived from their roles. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermissions {
    // Course management
    pub can_create_courses: bool,
    pub can_edit_all_courses: bool,
    pub can_delete_courses: bool,
    pub can_assign_courses: bool,

    // User management
    pub can_create_users: bool,
    pub can_edit_users: bool,
    pub can_delete_users: bool,
    pub can_assign_roles: bool,

    // Organizational management
    pub can_manage_schools: bool,
    pub can_manage_generations: bool,
    pub can_manage_communities: bool,

    // Reporting and feedback reach
    pub reporting_scope: Scope,
    pub feedback_scope: Scope,
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::none()
    }
}

impl RolePermissions {
    /// Every flag off, both scopes `individual`.
    pub const fn none() -> Self {
        Self {
            can_create_courses: false,
            can_edit_all_courses: false,
            can_delete_courses: false,
            can_assign_courses: false,
            can_create_users: false,
            can_edit_users: false,
            can_delete_users: false,
            can_assign_roles: false,
            can_manage_schools: false,
            can_manage_generations: false,
            can_manage_communities: false,
            reporting_scope: Scope::Individual,
            feedback_scope: Scope::Individual,
        }
    }

    const fn scoped(scope: Scope) -> Self {
        let mut perms = Self::none();
        perms.reporting_scope = scope;
        perms.feedback_scope = scope;
        perms
    }

    /// Role hierarchy: what a single role grants on its own.
    pub const fn for_role(role: RoleType) -> Self {
        match role {
            RoleType::Admin => Self {
                can_create_courses: true,
                can_edit_all_courses: true,
                can_delete_courses: true,
                can_assign_courses: true,
                can_create_users: true,
                can_edit_users: true,
                can_delete_users: true,
                can_assign_roles: true,
                can_manage_schools: true,
                can_manage_generations: true,
                can_manage_communities: true,
                reporting_scope: Scope::Global,
                feedback_scope: Scope::Global,
            },
            RoleType::Consultor => {
                let mut perms = Self::scoped(Scope::School);
                perms.can_assign_courses = true;
                perms
            }
            RoleType::EquipoDirectivo => Self::scoped(Scope::School),
            RoleType::LiderGeneracion => Self::scoped(Scope::Generation),
            RoleType::LiderComunidad => Self::scoped(Scope::Community),
            RoleType::SupervisorDeRed => Self::scoped(Scope::Network),
            RoleType::CommunityManager | RoleType::Docente => Self::none(),
        }
    }

    /// Value of a boolean flag; `None` for scope keys.
    pub fn flag(&self, key: PermissionKey) -> Option<bool> {
        let value = match key {
            PermissionKey::CanCreateCourses => self.can_create_courses,
            PermissionKey::CanEditAllCourses => self.can_edit_all_courses,
            PermissionKey::CanDeleteCourses => self.can_delete_courses,
            PermissionKey::CanAssignCourses => self.can_assign_courses,
            PermissionKey::CanCreateUsers => self.can_create_users,
            PermissionKey::CanEditUsers => self.can_edit_users,
            PermissionKey::CanDeleteUsers => self.can_delete_users,
            PermissionKey::CanAssignRoles => self.can_assign_roles,
            PermissionKey::CanManageSchools => self.can_manage_schools,
            PermissionKey::CanManageGenerations => self.can_manage_generations,
            PermissionKey::CanManageCommunities => self.can_manage_communities,
            PermissionKey::ReportingScope | PermissionKey::FeedbackScope => return None,
        };
        Some(value)
    }

    fn flag_mut(&mut self, key: PermissionKey) -> Option<&mut bool> {
        let slot = match key {
            PermissionKey::CanCreateCourses => &mut self.can_create_courses,
            PermissionKey::CanEditAllCourses => &mut self.can_edit_all_courses,
            PermissionKey::CanDeleteCourses => &mut self.can_delete_courses,
            PermissionKey::CanAssignCourses => &mut self.can_assign_courses,
            PermissionKey::CanCreateUsers => &mut self.can_create_users,
            PermissionKey::CanEditUsers => &mut self.can_edit_users,
            PermissionKey::CanDeleteUsers => &mut self.can_delete_users,
            PermissionKey::CanAssignRoles => &mut self.can_assign_roles,
            PermissionKey::CanManageSchools => &mut self.can_manage_schools,
            PermissionKey::CanManageGenerations => &mut self.can_manage_generations,
            PermissionKey::CanManageCommunities => &mut self.can_manage_communities,
            PermissionKey::ReportingScope | PermissionKey::FeedbackScope => return None,
        };
        Some(slot)
    }

    /// Value of a scope key; `None` for boolean keys.
    pub fn scope(&self, key: PermissionKey) -> Option<Scope> {
        match key {
            PermissionKey::ReportingScope => Some(self.reporting_scope),
            PermissionKey::FeedbackScope => Some(self.feedback_scope),
            _ => None,
        }
    }

    /// Whether `key` is granted.
    ///
    /// Boolean keys are granted iff the flag is `true`; scope keys iff the scope
    /// is broader than `individual`.
    pub fn grants(&self, key: PermissionKey) -> bool {
        match self.scope(key) {
            Some(scope) => scope.is_granted(),
            None => self.flag(key).unwrap_or(false),
        }
    }

    /// String-keyed variant of [`RolePermissions::grants`]; unknown keys are never granted.
    pub fn has_permission(&self, key: &str) -> bool {
        key.parse::<PermissionKey>()
            .map(|k| self.grants(k))
            .unwrap_or(false)
    }

    /// Keys currently granted, in declaration order.
    pub fn granted_keys(&self) -> Vec<PermissionKey> {
        PermissionKey::ALL
            .into_iter()
            .filter(|k| self.grants(*k))
            .collect()
    }

    /// OR the flags of `other` into `self` and keep the broadest scopes.
    pub fn merge(&mut self, other: &RolePermissions) {
        for key in PermissionKey::ALL {
            if let (Some(slot), Some(value)) = (self.flag_mut(key), other.flag(key)) {
                *slot = *slot || value;
            }
        }
        self.reporting_scope = self.reporting_scope.max(other.reporting_scope);
        self.feedback_scope = self.feedback_scope.max(other.feedback_scope);
    }
}

/// Aggregate permissions over every active role a user holds.
///
/// A legacy `admin` hint short-circuits to full admin permissions; a user with
/// no active roles gets the `docente` row.
pub fn get_user_permissions(roles: &[UserRole], legacy_hint: Option<&str>) -> RolePermissions {
    let legacy = legacy_hint.and_then(LegacyRole::from_column);
    if legacy == Some(LegacyRole::Admin) {
        return RolePermissions::for_role(RoleType::Admin);
    }

    let mut active = roles.iter().filter(|r| r.is_active).peekable();
    if active.peek().is_none() {
        return RolePermissions::for_role(RoleType::Docente);
    }

    let mut permissions = RolePermissions::none();
    for role in active {
        permissions.merge(&RolePermissions::for_role(role.role_type));
    }
    permissions
}
