//! One resolution pass: session in, profile/roles/permissions out.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use genera_auth::{
    LegacyRole, Profile, RolePermissions, RoleType, Session, UserRole, get_user_permissions,
    validate_session,
};
use genera_core::UserId;
use genera_infra::{DirectoryError, MigrationOutcome, RoleDirectory, has_admin_privileges, migrate_legacy_user};

use crate::avatar::resolve_avatar_url;
use crate::cache::ProfileCache;
use crate::config::ClientConfig;
use crate::roles_api::{RolesApiError, RolesSource};

/// Where the published role list came from.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// No roles were read (signed out, or both sources failed).
    #[default]
    None,
    /// `GET /api/auth/my-roles`.
    Api,
    /// Direct directory query after the API call failed.
    DirectQuery,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("profile fetch failed: {0}")]
    ProfileFetch(DirectoryError),

    #[error("no profile row for user {0}")]
    ProfileMissing(UserId),

    /// Both role sources failed; the user is signed in with no roles.
    #[error("roles unavailable (api: {api}; direct query: {direct})")]
    RolesUnavailable { api: RolesApiError, direct: DirectoryError },
}

impl ResolveError {
    /// Whether the pass could still publish an authenticated state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ResolveError::RolesUnavailable { .. })
    }
}

/// Outcome of a pass that found the user's profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub profile: Profile,
    pub roles: Vec<UserRole>,
    pub role_source: RoleSource,
    pub permissions: RolePermissions,
    pub is_admin: bool,
    pub is_global_admin: bool,
    pub avatar_url: String,
    /// Non-fatal failure recorded during the pass.
    pub warning: Option<ResolveError>,
}

/// Runs resolution passes against the directory and the roles API.
pub struct Resolver {
    directory: Arc<dyn RoleDirectory>,
    roles_api: Arc<dyn RolesSource>,
    cache: ProfileCache,
    storage_url: Option<String>,
    avatar_bucket: String,
    /// Held across the check-then-insert of a legacy migration.
    migration: Mutex<()>,
}

impl Resolver {
    pub fn new(
        directory: Arc<dyn RoleDirectory>,
        roles_api: Arc<dyn RolesSource>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            directory,
            roles_api,
            cache: ProfileCache::new(config.profile_cache_ttl),
            storage_url: config.storage_url.clone(),
            avatar_bucket: config.avatar_bucket.clone(),
            migration: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Resolve a session: profile → roles → legacy migration → admin check →
    /// permissions. Every step awaits the previous one.
    #[instrument(skip(self, session), fields(user_id = %session.user.id))]
    pub async fn resolve(&self, session: &Session) -> Result<Resolution, ResolveError> {
        let user_id = session.user.id;
        let profile = self.load_profile(user_id).await?;

        let (mut roles, mut role_source, warning) = self.load_roles(session).await;

        if roles.is_empty() && warning.is_none() {
            if let Some(legacy) = profile.legacy_role() {
                if let Some(migrated) = self.migrate(user_id, legacy).await {
                    roles = migrated;
                    role_source = RoleSource::DirectQuery;
                }
            }
        }

        let (permissions, is_global_admin) = if warning.is_some() {
            (RolePermissions::none(), false)
        } else {
            let holds_admin = roles
                .iter()
                .any(|r| r.is_active && r.role_type == RoleType::Admin);
            let is_global_admin = holds_admin || has_admin_privileges(self.directory.as_ref(), user_id).await;
            (get_user_permissions(&roles, profile.role.as_deref()), is_global_admin)
        };
        let is_admin = profile.is_legacy_admin() || is_global_admin;

        let avatar_url = resolve_avatar_url(
            Some(&profile),
            &session.user,
            self.storage_url.as_deref(),
            &self.avatar_bucket,
        );

        info!(
            role_count = roles.len(),
            role_source = ?role_source,
            is_admin,
            "resolved session"
        );

        Ok(Resolution {
            profile,
            roles,
            role_source,
            permissions,
            is_admin,
            is_global_admin,
            avatar_url,
            warning,
        })
    }

    /// Migrate a legacy user and re-read their roles.
    ///
    /// Passes for the same context run this one at a time; a pass that finds
    /// the user already migrated picks up the rows written by the other.
    async fn migrate(&self, user_id: UserId, legacy: LegacyRole) -> Option<Vec<UserRole>> {
        let _guard = self.migration.lock().await;

        match migrate_legacy_user(self.directory.as_ref(), user_id, legacy).await {
            Ok(MigrationOutcome::Migrated(_) | MigrationOutcome::AlreadyMigrated) => {}
            Err(e) => {
                warn!(error = %e, "legacy migration failed; keeping empty role list");
                return None;
            }
        }

        match self.directory.active_roles(user_id).await {
            Ok(roles) => Some(roles),
            Err(e) => {
                warn!(error = %e, "re-reading roles after migration failed");
                None
            }
        }
    }

    async fn load_profile(&self, user_id: UserId) -> Result<Profile, ResolveError> {
        if let Some(profile) = self.cache.get(user_id).await {
            return Ok(profile);
        }

        let profile = self
            .directory
            .fetch_profile(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, "profile fetch failed");
                ResolveError::ProfileFetch(e)
            })?
            .ok_or(ResolveError::ProfileMissing(user_id))?;

        self.cache.insert(profile.clone()).await;
        Ok(profile)
    }

    /// Roles from the API; on any failure, exactly one direct query; then empty.
    async fn load_roles(&self, session: &Session) -> (Vec<UserRole>, RoleSource, Option<ResolveError>) {
        let api = match validate_session(session, Utc::now()) {
            Ok(()) => self.roles_api.fetch_my_roles(&session.access_token).await,
            Err(e) => Err(RolesApiError::from(e)),
        };

        let api_error = match api {
            Ok(roles) => {
                let active = roles.into_iter().filter(|r| r.is_active).collect();
                return (active, RoleSource::Api, None);
            }
            Err(e) => e,
        };

        warn!(error = %api_error, "roles API failed; falling back to direct query");
        match self.directory.active_roles(session.user.id).await {
            Ok(roles) => (roles, RoleSource::DirectQuery, None),
            Err(direct) => {
                error!(error = %direct, "direct role query failed; continuing without roles");
                (
                    Vec::new(),
                    RoleSource::None,
                    Some(ResolveError::RolesUnavailable {
                        api: api_error,
                        direct,
                    }),
                )
            }
        }
    }
}
