//! Per-user profile cache with a fixed time-to-live.

use std::time::Duration;

use moka::future::Cache;

use genera_auth::Profile;
use genera_core::UserId;

/// Upper bound on cached profiles; least recently used entries go first.
pub const DEFAULT_PROFILE_CACHE_CAPACITY: u64 = 10_000;

/// Process-local profile cache. Expired entries are dropped by the cache's
/// own housekeeping, whether or not they are read again.
#[derive(Debug, Clone)]
pub struct ProfileCache {
    inner: Cache<UserId, Profile>,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(DEFAULT_PROFILE_CACHE_CAPACITY, ttl)
    }

    pub fn with_capacity(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, user_id: UserId) -> Option<Profile> {
        self.inner.get(&user_id).await
    }

    pub async fn insert(&self, profile: Profile) {
        self.inner.insert(profile.id, profile).await;
    }

    pub async fn invalidate(&self, user_id: UserId) {
        self.inner.invalidate(&user_id).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Live entries, after pending evictions have been applied.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_entries_are_served() {
        let cache = ProfileCache::new(Duration::from_secs(300));
        let profile = Profile::new(UserId::new());
        cache.insert(profile.clone()).await;

        assert_eq!(cache.get(profile.id).await, Some(profile));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = ProfileCache::new(Duration::from_millis(50));
        let profile = Profile::new(UserId::new());
        cache.insert(profile.clone()).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get(profile.id).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_without_being_read() {
        let cache = ProfileCache::new(Duration::from_millis(50));
        for _ in 0..1000 {
            cache.insert(Profile::new(UserId::new())).await;
        }

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn capacity_bounds_the_cache() {
        let cache = ProfileCache::with_capacity(10, Duration::from_secs(300));
        for _ in 0..200 {
            cache.insert(Profile::new(UserId::new())).await;
        }

        assert!(cache.len().await <= 10);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = ProfileCache::new(Duration::from_secs(300));
        let profile = Profile::new(UserId::new());
        cache.insert(profile.clone()).await;
        cache.insert(Profile::new(UserId::new())).await;
        assert_eq!(cache.len().await, 2);

        cache.clear();
        assert_eq!(cache.get(profile.id).await, None);
        assert!(cache.is_empty().await);
    }
}
