use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use genera_auth::{Generation, GrowthCommunity, Profile, RoleType, School, UserRole};
use genera_core::{CommunityId, GenerationId, SchoolId, UserId};

use super::r#trait::{DirectoryError, RoleDirectory};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    roles: Vec<UserRole>,
    schools: HashMap<SchoolId, School>,
    generations: HashMap<GenerationId, Generation>,
    communities: HashMap<CommunityId, GrowthCommunity>,
}

impl Tables {
    fn join(&self, mut role: UserRole) -> UserRole {
        role.school = role.school_id.and_then(|id| self.schools.get(&id).cloned());
        role.generation = role.generation_id.and_then(|id| self.generations.get(&id).cloned());
        role.community = role.community_id.and_then(|id| self.communities.get(&id).cloned());
        role
    }
}

/// In-memory directory.
///
/// Intended for tests/dev. Reads can be made to fail on demand and are
/// counted, so callers can assert on fallback behaviour.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
    fail_profiles: AtomicBool,
    fail_roles: AtomicBool,
    profile_reads: AtomicUsize,
    role_reads: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_profile(&self, profile: Profile) {
        if let Ok(mut tables) = self.tables.write() {
            tables.profiles.insert(profile.id, profile);
        }
    }

    pub fn add_role(&self, role: UserRole) {
        if let Ok(mut tables) = self.tables.write() {
            tables.roles.push(role);
        }
    }

    pub fn add_school(&self, school: School) {
        if let Ok(mut tables) = self.tables.write() {
            tables.schools.insert(school.id, school);
        }
    }

    pub fn add_generation(&self, generation: Generation) {
        if let Ok(mut tables) = self.tables.write() {
            tables.generations.insert(generation.id, generation);
        }
    }

    pub fn add_community(&self, community: GrowthCommunity) {
        if let Ok(mut tables) = self.tables.write() {
            tables.communities.insert(community.id, community);
        }
    }

    /// Make every subsequent profile read fail (or succeed again).
    pub fn fail_profile_reads(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent role read fail (or succeed again).
    pub fn fail_role_reads(&self, fail: bool) {
        self.fail_roles.store(fail, Ordering::SeqCst);
    }

    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }

    pub fn role_reads(&self) -> usize {
        self.role_reads.load(Ordering::SeqCst)
    }

    /// Number of stored role rows for a user, active or not.
    pub fn role_count(&self, user_id: UserId) -> usize {
        self.tables
            .read()
            .map(|t| t.roles.iter().filter(|r| r.user_id == user_id).count())
            .unwrap_or(0)
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl RoleDirectory for InMemoryDirectory {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, DirectoryError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(DirectoryError::Query("profiles: injected failure".to_string()));
        }

        let tables = self.tables.read().map_err(|_| poisoned())?;
        let Some(mut profile) = tables.profiles.get(&user_id).cloned() else {
            return Ok(None);
        };
        profile.school = profile.school_id.and_then(|id| tables.schools.get(&id).cloned());
        profile.generation = profile
            .generation_id
            .and_then(|id| tables.generations.get(&id).cloned());
        profile.community = profile
            .community_id
            .and_then(|id| tables.communities.get(&id).cloned());
        Ok(Some(profile))
    }

    async fn active_roles(&self, user_id: UserId) -> Result<Vec<UserRole>, DirectoryError> {
        self.role_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(DirectoryError::Query("user_roles: injected failure".to_string()));
        }

        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut roles: Vec<UserRole> = tables
            .roles
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active)
            .cloned()
            .map(|r| tables.join(r))
            .collect();
        roles.sort_by_key(|r| r.role_type.as_str());
        Ok(roles)
    }

    async fn is_global_admin(&self, user_id: UserId) -> Result<bool, DirectoryError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(DirectoryError::Query("user_roles: injected failure".to_string()));
        }

        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .roles
            .iter()
            .any(|r| r.user_id == user_id && r.is_active && r.role_type == RoleType::Admin))
    }

    async fn insert_role(&self, role: UserRole) -> Result<(), DirectoryError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let held = tables
            .roles
            .iter()
            .any(|r| r.user_id == role.user_id && r.role_type == role.role_type && r.is_active);
        if !held {
            tables.roles.push(role);
        }
        Ok(())
    }

    async fn school_id_by_code(&self, code: &str) -> Result<Option<SchoolId>, DirectoryError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .schools
            .values()
            .find(|s| s.code.as_deref() == Some(code))
            .map(|s| s.id))
    }
}
