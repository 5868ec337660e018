use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::api::ListingItem;

use super::CachedData;

/// Session store for directory listings.
///
/// Listings are the most expensive thing to rebuild (one contents API call
/// per page, rate limited), so they are written to disk and reused by later
/// runs until the TTL passes.
pub struct ListingStore {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl ListingStore {
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self { cache_dir, ttl })
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("listing_{}.json", name))
    }

    pub fn load(&self, key: &str) -> Result<Option<CachedData<Vec<ListingItem>>>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read listing cache: {}", key))?;

        let cached = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse listing cache: {}", key))?;

        Ok(Some(cached))
    }

    /// Listing for `key` if one was saved less than a TTL ago.
    /// Unreadable files count as missing.
    pub fn load_fresh(&self, key: &str) -> Option<Vec<ListingItem>> {
        match self.load(key) {
            Ok(Some(cached)) if !cached.is_older_than(self.ttl) => {
                debug!(listing = key, age = %cached.age_display(), "Using stored listing");
                Some(cached.data)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(listing = key, error = %e, "Failed to load stored listing");
                None
            }
        }
    }

    pub fn save(&self, key: &str, items: &[ListingItem]) -> Result<()> {
        let cached = CachedData::new(items);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(key), contents)
            .with_context(|| format!("Failed to write listing cache: {}", key))?;
        Ok(())
    }

    /// Remove every stored listing.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let is_listing = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("listing_") && n.ends_with(".json"));
            if is_listing {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
