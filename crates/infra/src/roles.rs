//! Role utilities over a [`RoleDirectory`].

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument};

use genera_auth::{LegacyRole, Profile, RoleType, UserRole};
use genera_core::UserId;

use crate::directory::{DirectoryError, RoleDirectory};

/// Code of the school docentes are attached to when migrated without one.
pub const DEFAULT_SCHOOL_CODE: &str = "DEMO001";

/// A profile together with its active role assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileWithRoles {
    #[serde(flatten)]
    pub profile: Profile,
    pub user_roles: Vec<UserRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The user already had at least one active role; nothing was written.
    AlreadyMigrated,
    /// One role row was inserted.
    Migrated(RoleType),
}

/// Active roles of a user.
pub async fn get_user_roles<D>(dir: &D, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError>
where
    D: RoleDirectory + ?Sized,
{
    dir.active_roles(user_id).await
}

/// Profile plus active roles; `Ok(None)` when the profile does not exist.
#[instrument(skip(dir), fields(user_id = %user_id), err)]
pub async fn get_user_profile_with_roles<D>(
    dir: &D,
    user_id: UserId,
) -> Result<Option<ProfileWithRoles>, DirectoryError>
where
    D: RoleDirectory + ?Sized,
{
    let Some(profile) = dir.fetch_profile(user_id).await? else {
        return Ok(None);
    };
    let user_roles = dir.active_roles(user_id).await?;
    Ok(Some(ProfileWithRoles { profile, user_roles }))
}

/// Whether the user is a global admin. Directory failures count as "no".
pub async fn has_admin_privileges<D>(dir: &D, user_id: UserId) -> bool
where
    D: RoleDirectory + ?Sized,
{
    match dir.is_global_admin(user_id).await {
        Ok(is_admin) => is_admin,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "global admin check failed");
            false
        }
    }
}

/// Move a user off the legacy `profiles.role` column onto a role row.
///
/// Idempotent: nothing is written when the user already holds an active role.
/// Docentes are attached to the [`DEFAULT_SCHOOL_CODE`] school when it exists.
#[instrument(skip(dir), fields(user_id = %user_id, legacy = ?legacy), err)]
pub async fn migrate_legacy_user<D>(
    dir: &D,
    user_id: UserId,
    legacy: LegacyRole,
) -> Result<MigrationOutcome, DirectoryError>
where
    D: RoleDirectory + ?Sized,
{
    if !dir.active_roles(user_id).await?.is_empty() {
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    let role_type = legacy.target_role();
    let mut role = UserRole::new(user_id, role_type);
    role.assigned_at = Some(Utc::now());

    if role_type == RoleType::Docente {
        if let Some(school_id) = dir.school_id_by_code(DEFAULT_SCHOOL_CODE).await? {
            role = role.with_school(school_id);
        }
    }

    dir.insert_role(role).await?;
    info!(user_id = %user_id, role = %role_type, "migrated legacy user");
    Ok(MigrationOutcome::Migrated(role_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use genera_auth::School;
    use genera_core::SchoolId;

    fn demo_school() -> School {
        School {
            id: SchoolId::new(1),
            name: "Colegio Demo".to_string(),
            code: Some(DEFAULT_SCHOOL_CODE.to_string()),
            has_generations: Some(false),
        }
    }

    #[tokio::test]
    async fn profile_with_roles_is_none_for_unknown_user() {
        let dir = InMemoryDirectory::new();
        assert_eq!(get_user_profile_with_roles(&dir, UserId::new()).await, Ok(None));
    }

    #[tokio::test]
    async fn profile_with_roles_carries_active_roles() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new();
        dir.upsert_profile(Profile::new(user));
        dir.add_role(UserRole::new(user, RoleType::Consultor));

        let found = get_user_profile_with_roles(&dir, user).await.unwrap().unwrap();
        assert_eq!(found.profile.id, user);
        assert_eq!(found.user_roles.len(), 1);

        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["user_roles"][0]["role_type"], "consultor");
        assert!(json.get("id").is_some());
    }

    #[tokio::test]
    async fn admin_privileges_swallow_directory_errors() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new();
        dir.add_role(UserRole::new(user, RoleType::Admin));
        assert!(has_admin_privileges(&dir, user).await);

        dir.fail_role_reads(true);
        assert!(!has_admin_privileges(&dir, user).await);
    }

    #[tokio::test]
    async fn docente_migration_uses_default_school() {
        let dir = InMemoryDirectory::new();
        dir.add_school(demo_school());
        let user = UserId::new();

        let outcome = migrate_legacy_user(&dir, user, LegacyRole::Docente).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated(RoleType::Docente));

        let roles = get_user_roles(&dir, user).await.unwrap();
        assert_eq!(roles[0].school_id, Some(SchoolId::new(1)));
    }

    #[tokio::test]
    async fn docente_migration_without_default_school_still_inserts() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new();
        migrate_legacy_user(&dir, user, LegacyRole::Docente).await.unwrap();
        let roles = get_user_roles(&dir, user).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].school_id, None);
    }

    #[tokio::test]
    async fn migrating_twice_keeps_role_count() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new();

        let first = migrate_legacy_user(&dir, user, LegacyRole::Admin).await.unwrap();
        assert_eq!(first, MigrationOutcome::Migrated(RoleType::Admin));
        let count = dir.role_count(user);

        let second = migrate_legacy_user(&dir, user, LegacyRole::Admin).await.unwrap();
        assert_eq!(second, MigrationOutcome::AlreadyMigrated);
        assert_eq!(dir.role_count(user), count);
    }

    #[tokio::test]
    async fn migration_propagates_read_failures() {
        let dir = InMemoryDirectory::new();
        dir.fail_role_reads(true);
        let result = migrate_legacy_user(&dir, UserId::new(), LegacyRole::Admin).await;
        assert!(matches!(result, Err(DirectoryError::Query(_))));
    }
}
