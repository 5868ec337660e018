//! Cached, deduplicated access to the dataset.
//!
//! `DataService` is the only entry point the rendering layer needs. Each
//! instance owns its caches; clones share them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{FetchClient, GithubRepo, HttpTransport, ReqwestTransport};
use crate::cache::{ListingStore, TtlCache};
use crate::config::Config;
use crate::error::DataError;
use crate::models::{Record, StatsRecord};
use crate::query::{project, QueryOptions};
use crate::source::catalog::STATS;
use crate::source::{
    resolve_collection, Catalog, Collection, Resolution, Resolved, SourceContext,
};

type PendingResolution = Shared<BoxFuture<'static, Resolution>>;

struct ServiceInner {
    ctx: SourceContext,
    catalog: Catalog,
    collections: TtlCache<Resolved>,
    stats: TtlCache<StatsRecord>,
    /// Resolutions currently running, keyed by collection and fallback flag.
    inflight: Mutex<HashMap<String, PendingResolution>>,
}

/// Cases and policies, loaded together.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub cases: Vec<Record>,
    pub policies: Vec<Record>,
}

#[derive(Clone)]
pub struct DataService {
    inner: Arc<ServiceInner>,
}

impl DataService {
    /// Service over the network, with the standard source catalog.
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        let mut ctx = Self::source_context(config, transport);

        if config.persist_listings {
            let store = ListingStore::new(config.cache_dir()?, config.cache_ttl())?;
            ctx = ctx.with_listing_store(store);
        }

        Ok(Self::from_parts(config, ctx, Catalog::standard(&config.repo)))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_catalog(config, transport, Catalog::standard(&config.repo))
    }

    pub fn with_catalog(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        catalog: Catalog,
    ) -> Self {
        Self::from_parts(config, Self::source_context(config, transport), catalog)
    }

    fn source_context(config: &Config, transport: Arc<dyn HttpTransport>) -> SourceContext {
        let fetch = FetchClient::new(transport, config.retry);
        SourceContext::new(
            GithubRepo::new(fetch, config.repo.clone()),
            config.local_data_path.clone(),
            config.batch,
        )
    }

    fn from_parts(config: &Config, ctx: SourceContext, catalog: Catalog) -> Self {
        let ttl = config.cache_ttl();
        Self {
            inner: Arc::new(ServiceInner {
                ctx,
                catalog,
                collections: TtlCache::new(ttl),
                stats: TtlCache::new(ttl),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &SourceContext {
        &self.inner.ctx
    }

    /// Resolve a collection through the cache.
    ///
    /// A live entry is returned without consulting any source unless
    /// `force_refresh` is set. Concurrent callers for the same collection
    /// share one resolution. Only non-fallback results are cached.
    pub async fn resolve(&self, collection: Collection, options: &QueryOptions) -> Resolution {
        let name = collection.name();
        if !options.force_refresh {
            if let Some(resolved) = self.inner.collections.get(name).await {
                debug!(collection = name, source = %resolved.source, "Cache hit");
                return Resolution::Found(resolved);
            }
        }

        let key = format!("{}:{}", name, options.use_fallback);
        let pending = {
            let mut inflight = self.inner.inflight.lock().await;
            match inflight.get(&key) {
                Some(pending) => {
                    debug!(collection = name, "Joining in-flight resolution");
                    pending.clone()
                }
                None => {
                    let pending = self.start_resolution(collection, options.use_fallback, key.clone());
                    inflight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_resolution(
        &self,
        collection: Collection,
        use_fallback: bool,
        key: String,
    ) -> PendingResolution {
        let inner = Arc::clone(&self.inner);
        async move {
            let options = QueryOptions {
                use_fallback,
                ..QueryOptions::default()
            };
            let name = collection.name();
            let resolution =
                resolve_collection(name, inner.catalog.sources(collection), &inner.ctx, &options)
                    .await;

            if let Resolution::Found(resolved) = &resolution {
                if !resolved.fallback {
                    inner.collections.put(name, resolved.clone()).await;
                }
            }
            inner.inflight.lock().await.remove(&key);
            resolution
        }
        .boxed()
        .shared()
    }

    pub async fn resolve_cases(&self, options: &QueryOptions) -> Resolution {
        self.resolve(Collection::Cases, options).await
    }

    pub async fn resolve_policies(&self, options: &QueryOptions) -> Resolution {
        self.resolve(Collection::Policies, options).await
    }

    /// Filtered cases. Empty when nothing matches or the collection is empty.
    pub async fn fetch_all_cases(&self, options: &QueryOptions) -> Result<Vec<Record>, DataError> {
        self.fetch_all(Collection::Cases, options).await
    }

    pub async fn fetch_all_policies(
        &self,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, DataError> {
        self.fetch_all(Collection::Policies, options).await
    }

    async fn fetch_all(
        &self,
        collection: Collection,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, DataError> {
        match self.resolve(collection, options).await {
            Resolution::Found(resolved) => Ok(project(&resolved.records, options)),
            Resolution::EmptyButPresent => Ok(Vec::new()),
            Resolution::Unavailable => Err(DataError::Unavailable(collection.name().to_string())),
        }
    }

    /// Both collections, fetched concurrently.
    pub async fn load_all(&self, options: &QueryOptions) -> Result<Dataset, DataError> {
        let (cases, policies) =
            tokio::try_join!(self.fetch_all_cases(options), self.fetch_all_policies(options))?;
        Ok(Dataset { cases, policies })
    }

    /// Dataset summary: the published stats file if one is reachable,
    /// otherwise derived from the resolved collections.
    pub async fn fetch_stats(&self, options: &QueryOptions) -> Result<StatsRecord, DataError> {
        if !options.force_refresh {
            if let Some(stats) = self.inner.stats.get(STATS).await {
                debug!("Stats cache hit");
                return Ok(stats);
            }
        }

        for source in &self.inner.catalog.stats {
            let document = match source.fetch_document(&self.inner.ctx).await {
                Ok(document) => document,
                Err(e) => {
                    debug!(source = ?source, error = %e, "Stats source failed, trying next");
                    continue;
                }
            };
            if !document.is_object() {
                warn!(source = ?source, "Stats file is not an object");
                continue;
            }
            match serde_json::from_value::<StatsRecord>(document) {
                Ok(stats) => {
                    info!(total_cases = stats.total_cases, "Stats loaded");
                    self.inner.stats.put(STATS, stats.clone()).await;
                    return Ok(stats);
                }
                Err(e) => warn!(source = ?source, error = %e, "Unreadable stats file"),
            }
        }

        let (cases, policies) = tokio::join!(
            self.resolve_cases(options),
            self.resolve_policies(options)
        );
        if matches!(
            (&cases, &policies),
            (Resolution::Unavailable, Resolution::Unavailable)
        ) {
            return Err(DataError::Unavailable(STATS.to_string()));
        }

        let stats = StatsRecord::derive(cases.records(), policies.records());
        info!(total_cases = stats.total_cases, total_policies = stats.total_policies, "Stats derived");

        let from_fallback = [&cases, &policies]
            .iter()
            .any(|r| matches!(r, Resolution::Found(resolved) if resolved.fallback));
        if !from_fallback {
            self.inner.stats.put(STATS, stats.clone()).await;
        }
        Ok(stats)
    }

    /// Drop one cache entry (`cases`, `policies` or `stats`).
    pub async fn invalidate(&self, name: &str) -> bool {
        let removed = if name == STATS {
            self.inner.stats.invalidate(name).await
        } else {
            self.inner.collections.invalidate(name).await
        };
        if removed {
            info!(cache = name, "Cache entry invalidated");
        }
        removed
    }

    /// Drop every cache entry, including stored listings.
    pub async fn invalidate_all(&self) {
        self.inner
            .collections
            .invalidate_all_with(&self.inner.stats)
            .await;
        if let Some(store) = &self.inner.ctx.listings {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear stored listings");
            }
        }
        info!("All caches invalidated");
    }

    /// Age of a live cache entry, e.g. `"5m ago"`.
    pub async fn cache_age(&self, name: &str) -> Option<String> {
        if name == STATS {
            self.inner.stats.age_display(name).await
        } else {
            self.inner.collections.age_display(name).await
        }
    }
}
