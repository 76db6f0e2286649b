//! Infrastructure layer: directory adapters (Postgres, in-memory) and the
//! role utilities built on them.

pub mod directory;
pub mod roles;

pub use directory::{DirectoryError, InMemoryDirectory, PostgresDirectory, RoleDirectory};
pub use roles::{
    DEFAULT_SCHOOL_CODE, MigrationOutcome, ProfileWithRoles, get_user_profile_with_roles,
    get_user_roles, has_admin_privileges, migrate_legacy_user,
};
