use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Wall-clock staleness, used for entries persisted to disk.
    pub fn is_older_than(&self, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => Utc::now() - self.cached_at >= ttl,
            Err(_) => false,
        }
    }
}

struct Slot<T> {
    cached: CachedData<T>,
    fetched: Instant,
}

/// In-memory cache whose entries expire `ttl` after they were stored.
///
/// Expiry uses the monotonic tokio clock; `cached_at` is kept for display.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Slot<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`, or `None` when absent or expired.
    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let slot = entries.get(key)?;
        if slot.fetched.elapsed() < self.ttl {
            Some(slot.cached.data.clone())
        } else {
            debug!(cache = key, "Entry expired");
            None
        }
    }

    /// Store `value`, replacing any previous entry and resetting its age.
    pub async fn put(&self, key: &str, value: T) {
        let slot = Slot {
            cached: CachedData::new(value),
            fetched: Instant::now(),
        };
        self.entries.write().await.insert(key.to_string(), slot);
    }

    /// Drop one entry. Returns whether it existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    /// Clear this cache and `other` as one step. Both write locks are taken,
    /// always in this order, before either map is cleared.
    pub async fn invalidate_all_with<U>(&self, other: &TtlCache<U>) {
        let mut mine = self.entries.write().await;
        let mut theirs = other.entries.write().await;
        mine.clear();
        theirs.clear();
    }

    /// Age of a live entry, e.g. `"5m ago"`.
    pub async fn age_display(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|slot| slot.fetched.elapsed() < self.ttl)
            .map(|slot| slot.cached.age_display())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_millis(300_000);

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - chrono::Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");
        cached.cached_at = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(cached.age_display(), "5m ago");
    }

    #[test]
    fn test_cached_data_is_older_than() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_older_than(TTL));

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - chrono::Duration::minutes(6);
        assert!(old.is_older_than(TTL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl_returns_value() {
        let cache = TtlCache::new(TTL);
        cache.put("cases", vec!["a".to_string()]).await;

        tokio::time::advance(Duration::from_millis(299_999)).await;
        assert_eq!(cache.get("cases").await, Some(vec!["a".to_string()]));
        assert!(cache.age_display("cases").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_is_absent() {
        let cache = TtlCache::new(TTL);
        cache.put("cases", 1).await;

        tokio::time::advance(TTL).await;
        assert_eq!(cache.get("cases").await, None);
        assert_eq!(cache.age_display("cases").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_resets_age() {
        let cache = TtlCache::new(TTL);
        cache.put("stats", 1).await;
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.put("stats", 2).await;
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(cache.get("stats").await, Some(2));
    }

    #[tokio::test]
    async fn test_invalidate_one_and_all() {
        let cache = TtlCache::new(TTL);
        cache.put("cases", 1).await;
        cache.put("policies", 2).await;

        assert!(cache.invalidate("cases").await);
        assert!(!cache.invalidate("cases").await);
        assert_eq!(cache.get("cases").await, None);
        assert_eq!(cache.get("policies").await, Some(2));

        cache.invalidate_all().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_all_with_clears_both_under_both_locks() {
        let collections = Arc::new(TtlCache::new(TTL));
        let stats = Arc::new(TtlCache::new(TTL));
        collections.put("cases", 1).await;
        stats.put("stats", 2).await;

        let reader = stats.entries.read().await;
        let clear = tokio::spawn({
            let collections = Arc::clone(&collections);
            let stats = Arc::clone(&stats);
            async move { collections.invalidate_all_with(&stats).await }
        });
        while collections.entries.try_read().is_ok() {
            tokio::task::yield_now().await;
        }

        // Collections are locked and stats untouched until the second lock is free
        assert!(collections.entries.try_read().is_err());
        assert_eq!(reader.len(), 1);
        drop(reader);

        clear.await.unwrap();
        assert!(collections.is_empty().await);
        assert!(stats.is_empty().await);
    }
}
