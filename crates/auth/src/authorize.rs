use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use genera_core::DomainError;

use crate::organization::{Generation, GrowthCommunity, School};
use crate::permissions::{PermissionKey, RolePermissions, Scope};
use crate::roles::{AssignmentScope, RoleType, UserRole};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(PermissionKey),
}

/// Pure policy check against already-derived permissions.
///
/// - No IO
/// - No panics
pub fn authorize(permissions: &RolePermissions, required: PermissionKey) -> Result<(), AuthzError> {
    if permissions.grants(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Highest-priority role among `roles`, per [`RoleType::PRIORITY`].
pub fn get_highest_role(roles: &[UserRole]) -> Option<RoleType> {
    roles
        .iter()
        .filter(|r| r.is_active)
        .map(|r| r.role_type)
        .min_by_key(RoleType::priority)
}

/// Whether any single role grants `key` on its own.
pub fn roles_grant(roles: &[UserRole], key: PermissionKey) -> bool {
    roles
        .iter()
        .filter(|r| r.is_active)
        .any(|r| RolePermissions::for_role(r.role_type).grants(key))
}

/// Permission check that also accounts for network-level reach.
///
/// With `required = Network` a network supervisor counts; with
/// `required = Global` only roles whose reporting scope is global count.
pub fn has_network_permission(roles: &[UserRole], key: PermissionKey, required: Scope) -> bool {
    roles.iter().filter(|r| r.is_active).any(|role| {
        let perms = RolePermissions::for_role(role.role_type);
        let granted = perms.grants(key);
        match required {
            Scope::Global => granted && perms.reporting_scope == Scope::Global,
            _ => granted,
        }
    })
}

/// Reach used to filter report data, with the id of the unit it is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataScope {
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
}

/// Id of the organizational unit a [`DataScope`] is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextId {
    School(i64),
    Uuid(Uuid),
}

/// Reporting reach of the user's highest role.
pub fn get_user_data_scope(roles: &[UserRole]) -> DataScope {
    let individual = DataScope {
        scope: Scope::Individual,
        context_id: None,
    };

    let Some(highest) = get_highest_role(roles) else {
        return individual;
    };
    let Some(role) = roles.iter().find(|r| r.is_active && r.role_type == highest) else {
        return individual;
    };

    let scope = RolePermissions::for_role(highest).reporting_scope;
    let context_id = match scope {
        Scope::Global | Scope::Individual => None,
        Scope::Network => role.red_id.map(|id| ContextId::Uuid(*id.as_uuid())),
        Scope::School => role.school_id.map(|id| ContextId::School(id.get())),
        Scope::Generation => role.generation_id.map(|id| ContextId::Uuid(*id.as_uuid())),
        Scope::Community => role.community_id.map(|id| ContextId::Uuid(*id.as_uuid())),
    };

    DataScope { scope, context_id }
}

/// Organizational units the user's roles are attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationalScope {
    pub schools: Vec<School>,
    pub generations: Vec<Generation>,
    pub communities: Vec<GrowthCommunity>,
}

/// Collect the joined schools/generations/communities of every scoped role.
///
/// `None` when the user holds no roles at all.
pub fn organizational_scope(roles: &[UserRole]) -> Option<OrganizationalScope> {
    if roles.is_empty() {
        return None;
    }

    let mut scope = OrganizationalScope::default();
    for role in roles {
        if role.school_id.is_some() {
            if let Some(school) = &role.school {
                if !scope.schools.iter().any(|s| s.id == school.id) {
                    scope.schools.push(school.clone());
                }
            }
        }
        if role.generation_id.is_some() {
            if let Some(generation) = &role.generation {
                if !scope.generations.iter().any(|g| g.id == generation.id) {
                    scope.generations.push(generation.clone());
                }
            }
        }
        if role.community_id.is_some() {
            if let Some(community) = &role.community {
                if !scope.communities.iter().any(|c| c.id == community.id) {
                    scope.communities.push(community.clone());
                }
            }
        }
    }
    Some(scope)
}

/// Validate that an assignment carries the scope its role requires.
pub fn validate_role_assignment(role: RoleType, scope: &AssignmentScope) -> Result<(), DomainError> {
    let requirements = role.requirements();
    let missing = if requirements.requires_school && scope.school_id.is_none() {
        Some("school")
    } else if requirements.requires_generation && scope.generation_id.is_none() {
        Some("generation")
    } else if requirements.requires_community && scope.community_id.is_none() {
        Some("community")
    } else {
        None
    };

    if let Some(unit) = missing {
        return Err(DomainError::MissingScope {
            role: role.display_name(),
            unit,
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a permission is (or is not) granted for a set of roles.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: PermissionKey,
    pub granted: bool,
    pub reason: String,
    /// Roles the user holds that grant the permission on their own.
    pub granting_roles: Vec<RoleType>,
    /// Roles that would grant it, for denied checks.
    pub suggested_roles: Vec<RoleType>,
}

/// Explain a permission decision over `roles` and the effective `permissions`.
pub fn explain_authorization(
    roles: &[UserRole],
    permissions: &RolePermissions,
    required: PermissionKey,
) -> AuthorizationExplanation {
    let granting_roles: Vec<RoleType> = RoleType::PRIORITY
        .into_iter()
        .filter(|t| roles.iter().any(|r| r.is_active && r.role_type == *t))
        .filter(|t| RolePermissions::for_role(*t).grants(required))
        .collect();

    if permissions.grants(required) {
        let reason = match granting_roles.first() {
            Some(role) => format!("'{}' is granted by role '{}'", required, role),
            None => format!("'{}' is granted by the legacy admin column", required),
        };
        return AuthorizationExplanation {
            required_permission: required,
            granted: true,
            reason,
            granting_roles,
            suggested_roles: Vec::new(),
        };
    }

    let suggested_roles: Vec<RoleType> = RoleType::PRIORITY
        .into_iter()
        .filter(|t| RolePermissions::for_role(*t).grants(required))
        .collect();

    let held: Vec<&str> = roles.iter().map(|r| r.role_type.as_str()).collect();
    AuthorizationExplanation {
        required_permission: required,
        granted: false,
        reason: format!("no held role grants '{}'. Current roles: {:?}", required, held),
        granting_roles,
        suggested_roles,
    }
}
