//! `genera-auth`: pure role/permission model for the learning platform.
//!
//! No HTTP and no storage: what a role grants, how scopes compare and what a
//! session looks like.

pub mod authorize;
pub mod claims;
pub mod organization;
pub mod permissions;
pub mod profile;
pub mod roles;
pub mod session;

pub use authorize::{
    AuthorizationExplanation, AuthzError, ContextId, DataScope, OrganizationalScope, authorize,
    explain_authorization, get_highest_role, get_user_data_scope, has_network_permission,
    organizational_scope, roles_grant, validate_role_assignment,
};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use organization::{Generation, GrowthCommunity, School};
pub use permissions::{PermissionKey, RolePermissions, Scope, UnknownPermission, get_user_permissions};
pub use profile::Profile;
pub use roles::{AssignmentScope, LegacyRole, RoleRequirements, RoleType, UserRole};
pub use session::{
    Session, SessionError, SessionUser, metadata_roles, primary_metadata_role, validate_session,
};
