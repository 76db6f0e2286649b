use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use genera_auth::{Profile, UserRole};
use genera_core::{SchoolId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory query failed: {0}")]
    Query(String),

    #[error("directory returned an undecodable row: {0}")]
    Decode(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Data access for profiles, role assignments and schools.
///
/// ## Contract
///
/// - `fetch_profile` returns `Ok(None)` when no profile row exists; errors are
///   reserved for transport/decoding failures.
/// - `active_roles` returns only rows with `is_active = true`, joined with
///   their school/generation/community where available.
/// - `insert_role` is a no-op when the user already holds an active row of
///   the same `role_type`.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, DirectoryError>;

    async fn active_roles(&self, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError>;

    /// Whether the user holds an active `admin` role row.
    async fn is_global_admin(&self, user_id: UserId) -> Result<bool, DirectoryError>;

    async fn insert_role(&self, role: UserRole) -> Result<(), DirectoryError>;

    async fn school_id_by_code(&self, code: &str) -> Result<Option<SchoolId>, DirectoryError>;
}

#[async_trait]
impl<S> RoleDirectory for Arc<S>
where
    S: RoleDirectory + ?Sized,
{
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, DirectoryError> {
        (**self).fetch_profile(user_id).await
    }

    async fn active_roles(&self, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError> {
        (**self).active_roles(user_id).await
    }

    async fn is_global_admin(&self, user_id: UserId) -> Result<bool, DirectoryError> {
        (**self).is_global_admin(user_id).await
    }

    async fn insert_role(&self, role: UserRole) -> Result<(), DirectoryError> {
        (**self).insert_role(role).await
    }

    async fn school_id_by_code(&self, code: &str) -> Result<Option<SchoolId>, DirectoryError> {
        (**self).school_id_by_code(code).await
    }
}
