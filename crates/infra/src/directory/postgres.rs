//! Postgres-backed directory.
//!
//! Reads the `profiles`, `user_roles`, `user_roles_cache`, `schools`,
//! `generations` and `growth_communities` tables. The connection is expected to
//! run with the caller's privileges; row-level security decides what is
//! visible.
//!
//! ## Error Mapping
//!
//! | SQLx Error | DirectoryError |
//! |------------|----------------|
//! | Database | `Query` |
//! | PoolClosed / PoolTimedOut / Io | `Unavailable` |
//! | ColumnDecode / ColumnNotFound / Decode | `Decode` |
//! | Other | `Query` |
//!
//! ## Role cache fallback
//!
//! When `user_roles` yields no rows for a user (RLS hiding them, or
//! replication lag), `active_roles` reads the `user_roles_cache` table instead.
//! The cache carries no `red_id`; network membership comes from `user_roles`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument, warn};
use uuid::Uuid;

use genera_auth::{Generation, GrowthCommunity, Profile, RoleType, School, UserRole};
use genera_core::{CommunityId, GenerationId, NetworkId, RoleAssignmentId, SchoolId, UserId};

use super::r#trait::{DirectoryError, RoleDirectory};

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn roles_from_cache(&self, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                NULL::uuid AS id,
                rc.user_id,
                rc.role::text AS role_type,
                rc.school_id::int8 AS school_id,
                rc.generation_id,
                rc.community_id,
                NULL::uuid AS red_id,
                true AS is_active,
                NULL::timestamptz AS assigned_at,
                s.name AS school_name,
                s.code AS school_code,
                s.has_generations AS school_has_generations,
                g.school_id::int8 AS generation_school_id,
                g.name AS generation_name,
                g.grade_range AS generation_grade_range,
                c.name AS community_name,
                c.school_id::int8 AS community_school_id,
                c.generation_id AS community_generation_id,
                c.max_teachers AS community_max_teachers
            FROM user_roles_cache rc
            LEFT JOIN schools s ON s.id = rc.school_id
            LEFT JOIN generations g ON g.id = rc.generation_id
            LEFT JOIN growth_communities c ON c.id = rc.community_id
            WHERE rc.user_id = $1
            ORDER BY rc.role
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_from_cache", e))?;

        decode_roles(&rows)
    }
}

#[async_trait]
impl RoleDirectory for PostgresDirectory {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                p.id,
                p.email,
                p.first_name,
                p.last_name,
                p.avatar_url,
                p.role,
                p.school_id::int8 AS school_id,
                p.generation_id,
                p.community_id,
                p.external_school_affiliation,
                s.name AS school_name,
                s.code AS school_code,
                s.has_generations AS school_has_generations,
                g.school_id::int8 AS generation_school_id,
                g.name AS generation_name,
                g.grade_range AS generation_grade_range,
                c.name AS community_name,
                c.school_id::int8 AS community_school_id,
                c.generation_id AS community_generation_id,
                c.max_teachers AS community_max_teachers
            FROM profiles p
            LEFT JOIN schools s ON s.id = p.school_id
            LEFT JOIN generations g ON g.id = p.generation_id
            LEFT JOIN growth_communities c ON c.id = p.community_id
            WHERE p.id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_profile", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let profile = ProfileRow::from_row(&row)
            .map_err(|e| DirectoryError::Decode(format!("failed to deserialize profile row: {}", e)))?;
        Ok(Some(profile.into()))
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_count), err)]
    async fn active_roles(&self, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                r.id,
                r.user_id,
                r.role_type::text AS role_type,
                r.school_id::int8 AS school_id,
                r.generation_id,
                r.community_id,
                r.red_id,
                r.is_active,
                r.assigned_at,
                s.name AS school_name,
                s.code AS school_code,
                s.has_generations AS school_has_generations,
                g.school_id::int8 AS generation_school_id,
                g.name AS generation_name,
                g.grade_range AS generation_grade_range,
                c.name AS community_name,
                c.school_id::int8 AS community_school_id,
                c.generation_id AS community_generation_id,
                c.max_teachers AS community_max_teachers
            FROM user_roles r
            LEFT JOIN schools s ON s.id = r.school_id
            LEFT JOIN generations g ON g.id = r.generation_id
            LEFT JOIN growth_communities c ON c.id = r.community_id
            WHERE r.user_id = $1 AND r.is_active = true
            ORDER BY r.role_type
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_roles", e))?;

        let mut roles = decode_roles(&rows)?;
        if roles.is_empty() {
            roles = self.roles_from_cache(user_id).await?;
            if !roles.is_empty() {
                warn!(user_id = %user_id, "user_roles empty; served roles from user_roles_cache");
            }
        }

        Span::current().record("role_count", roles.len());
        Ok(roles)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn is_global_admin(&self, user_id: UserId) -> Result<bool, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_roles
                WHERE user_id = $1 AND role_type = 'admin' AND is_active = true
            ) AS is_admin
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_global_admin", e))?;

        row.try_get("is_admin")
            .map_err(|e| DirectoryError::Decode(format!("is_admin: {}", e)))
    }

    /// Skipped when the user already holds an active row of the same type.
    #[instrument(skip(self, role), fields(user_id = %role.user_id, role_type = %role.role_type, inserted), err)]
    async fn insert_role(&self, role: UserRole) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (
                id, user_id, role_type, school_id, generation_id, community_id, red_id, is_active, assigned_at
            )
            SELECT $1, $2, $3::user_role_type, $4, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (
                SELECT 1 FROM user_roles
                WHERE user_id = $2 AND role_type = $3::user_role_type AND is_active = true
            )
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.user_id.as_uuid())
        .bind(role.role_type.as_str())
        .bind(role.school_id.map(|id| id.get()))
        .bind(role.generation_id.map(|id| *id.as_uuid()))
        .bind(role.community_id.map(|id| *id.as_uuid()))
        .bind(role.red_id.map(|id| *id.as_uuid()))
        .bind(role.is_active)
        .bind(role.assigned_at.unwrap_or_else(Utc::now))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;

        Span::current().record("inserted", result.rows_affected() > 0);
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn school_id_by_code(&self, code: &str) -> Result<Option<SchoolId>, DirectoryError> {
        let row = sqlx::query("SELECT id::int8 AS id FROM schools WHERE code = $1 LIMIT 1")
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("school_id_by_code", e))?;

        match row {
            Some(row) => {
                let id: i64 = row
                    .try_get("id")
                    .map_err(|e| DirectoryError::Decode(format!("schools.id: {}", e)))?;
                Ok(Some(SchoolId::new(id)))
            }
            None => Ok(None),
        }
    }
}

fn decode_roles(rows: &[PgRow]) -> Result<Vec<UserRole>, DirectoryError> {
    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        let decoded = RoleRow::from_row(row)
            .map_err(|e| DirectoryError::Decode(format!("failed to deserialize role row: {}", e)))?;
        roles.push(decoded.into_role()?);
    }
    Ok(roles)
}

/// Map SQLx errors to DirectoryError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            DirectoryError::Query(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            DirectoryError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            DirectoryError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => DirectoryError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            DirectoryError::Decode(format!("decode error in {}: {}", operation, err))
        }
        _ => DirectoryError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Joined organization columns shared by the profile and role queries.
#[derive(Debug)]
struct JoinedUnits {
    school: Option<School>,
    generation: Option<Generation>,
    community: Option<GrowthCommunity>,
}

impl JoinedUnits {
    fn from_row(
        row: &PgRow,
        school_id: Option<i64>,
        generation_id: Option<Uuid>,
        community_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        let school = match (school_id, row.try_get::<Option<String>, _>("school_name")?) {
            (Some(id), Some(name)) => Some(School {
                id: SchoolId::new(id),
                name,
                code: row.try_get("school_code")?,
                has_generations: row.try_get("school_has_generations")?,
            }),
            _ => None,
        };

        let generation = match (
            generation_id,
            row.try_get::<Option<String>, _>("generation_name")?,
            row.try_get::<Option<i64>, _>("generation_school_id")?,
        ) {
            (Some(id), Some(name), Some(school_id)) => Some(Generation {
                id: GenerationId::from_uuid(id),
                school_id: SchoolId::new(school_id),
                name,
                grade_range: row.try_get("generation_grade_range")?,
            }),
            _ => None,
        };

        let community = match (community_id, row.try_get::<Option<String>, _>("community_name")?) {
            (Some(id), Some(name)) => Some(GrowthCommunity {
                id: CommunityId::from_uuid(id),
                name,
                school_id: row
                    .try_get::<Option<i64>, _>("community_school_id")?
                    .map(SchoolId::new),
                generation_id: row
                    .try_get::<Option<Uuid>, _>("community_generation_id")?
                    .map(GenerationId::from_uuid),
                max_teachers: row.try_get("community_max_teachers")?,
            }),
            _ => None,
        };

        Ok(Self {
            school,
            generation,
            community,
        })
    }
}

#[derive(Debug)]
struct ProfileRow {
    id: Uuid,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    role: Option<String>,
    school_id: Option<i64>,
    generation_id: Option<Uuid>,
    community_id: Option<Uuid>,
    external_school_affiliation: Option<String>,
    joined: JoinedUnits,
}

impl<'r> FromRow<'r, PgRow> for ProfileRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let school_id: Option<i64> = row.try_get("school_id")?;
        let generation_id: Option<Uuid> = row.try_get("generation_id")?;
        let community_id: Option<Uuid> = row.try_get("community_id")?;

        Ok(ProfileRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            avatar_url: row.try_get("avatar_url")?,
            role: row.try_get("role")?,
            school_id,
            generation_id,
            community_id,
            external_school_affiliation: row.try_get("external_school_affiliation")?,
            joined: JoinedUnits::from_row(row, school_id, generation_id, community_id)?,
        })
    }
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: UserId::from_uuid(row.id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            role: row.role,
            school_id: row.school_id.map(SchoolId::new),
            generation_id: row.generation_id.map(GenerationId::from_uuid),
            community_id: row.community_id.map(CommunityId::from_uuid),
            external_school_affiliation: row.external_school_affiliation,
            school: row.joined.school,
            generation: row.joined.generation,
            community: row.joined.community,
        }
    }
}

#[derive(Debug)]
struct RoleRow {
    /// `NULL` for rows served from `user_roles_cache`.
    id: Option<Uuid>,
    user_id: Uuid,
    role_type: String,
    school_id: Option<i64>,
    generation_id: Option<Uuid>,
    community_id: Option<Uuid>,
    red_id: Option<Uuid>,
    is_active: Option<bool>,
    assigned_at: Option<DateTime<Utc>>,
    joined: JoinedUnits,
}

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let school_id: Option<i64> = row.try_get("school_id")?;
        let generation_id: Option<Uuid> = row.try_get("generation_id")?;
        let community_id: Option<Uuid> = row.try_get("community_id")?;

        Ok(RoleRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            role_type: row.try_get("role_type")?,
            school_id,
            generation_id,
            community_id,
            red_id: row.try_get("red_id")?,
            is_active: row.try_get("is_active")?,
            assigned_at: row.try_get("assigned_at")?,
            joined: JoinedUnits::from_row(row, school_id, generation_id, community_id)?,
        })
    }
}

impl RoleRow {
    fn into_role(self) -> Result<UserRole, DirectoryError> {
        let role_type: RoleType = self
            .role_type
            .parse()
            .map_err(|_| DirectoryError::Decode(format!("unknown role_type '{}'", self.role_type)))?;

        Ok(UserRole {
            id: self
                .id
                .map(RoleAssignmentId::from_uuid)
                .unwrap_or_else(RoleAssignmentId::new),
            user_id: UserId::from_uuid(self.user_id),
            role_type,
            school_id: self.school_id.map(SchoolId::new),
            generation_id: self.generation_id.map(GenerationId::from_uuid),
            community_id: self.community_id.map(CommunityId::from_uuid),
            red_id: self.red_id.map(NetworkId::from_uuid),
            is_active: self.is_active.unwrap_or(true),
            assigned_at: self.assigned_at,
            school: self.joined.school,
            generation: self.joined.generation,
            community: self.joined.community,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_row(role_type: &str, red_id: Option<Uuid>) -> RoleRow {
        RoleRow {
            id: None,
            user_id: Uuid::now_v7(),
            role_type: role_type.to_string(),
            school_id: None,
            generation_id: None,
            community_id: None,
            red_id,
            is_active: None,
            assigned_at: None,
            joined: JoinedUnits {
                school: None,
                generation: None,
                community: None,
            },
        }
    }

    #[test]
    fn network_membership_is_kept_on_decode() {
        let network = Uuid::now_v7();
        let role = role_row("supervisor_de_red", Some(network)).into_role().unwrap();

        assert_eq!(role.role_type, RoleType::SupervisorDeRed);
        assert_eq!(role.red_id, Some(NetworkId::from_uuid(network)));
        assert!(role.is_active);

        let scope = genera_auth::get_user_data_scope(&[role]);
        assert_eq!(scope.context_id, Some(genera_auth::ContextId::Uuid(network)));
    }

    #[test]
    fn cache_rows_without_network_decode() {
        let role = role_row("docente", None).into_role().unwrap();
        assert_eq!(role.red_id, None);
    }

    #[test]
    fn unknown_role_types_are_decode_errors() {
        assert!(matches!(
            role_row("rector", None).into_role(),
            Err(DirectoryError::Decode(_))
        ));
    }
}
