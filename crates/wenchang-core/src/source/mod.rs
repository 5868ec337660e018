//! Data sources and collection resolution.
//!
//! A logical collection (cases, policies) can be served by several sources:
//! aggregate files in the remote repo, the paginated remote directory of
//! per-record files, static files on disk, and an embedded fallback. The
//! resolver tries them in priority order and keeps the first non-empty
//! answer.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{FetchError, GithubRepo};
use crate::batch::{DirectoryQuery, Paginator};
use crate::cache::ListingStore;
use crate::config::BatchConfig;
use crate::models::Record;

pub mod catalog;
pub mod normalize;
pub mod resolver;

pub use catalog::{Catalog, Collection};
pub use normalize::{normalize_collection, normalize_collection_for};
pub use resolver::{resolve_collection, Resolution, Resolved};

/// Everything a source needs to reach its data.
pub struct SourceContext {
    pub repo: GithubRepo,
    pub local_root: PathBuf,
    pub batch: BatchConfig,
    pub listings: Option<ListingStore>,
}

impl SourceContext {
    pub fn new(repo: GithubRepo, local_root: PathBuf, batch: BatchConfig) -> Self {
        Self {
            repo,
            local_root,
            batch,
            listings: None,
        }
    }

    pub fn with_listing_store(mut self, store: ListingStore) -> Self {
        self.listings = Some(store);
        self
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.repo.clone(), self.batch)
    }
}

/// One candidate origin for a collection.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Short description used in logs and in `Resolved::source`.
    fn label(&self) -> String;

    /// Fallback sources are skipped unless the caller permits fallback data.
    fn is_fallback(&self) -> bool {
        false
    }

    /// Retrieve and normalize `collection`. An empty vector means the
    /// source answered but holds nothing.
    async fn fetch(
        &self,
        ctx: &SourceContext,
        collection: &str,
    ) -> Result<Vec<Record>, FetchError>;
}

/// Built-in source kinds.
#[derive(Debug, Clone)]
pub enum Source {
    /// File in the remote repo, fetched through the raw endpoint.
    RemoteFile { path: String },
    /// Directory of per-record files, listed page by page and downloaded in batches.
    RemoteDirectory {
        path: String,
        file_prefix: Option<String>,
        recursive: bool,
    },
    /// File below the configured local data path.
    LocalFile { path: PathBuf },
    /// Data compiled into the binary.
    Embedded {
        label: &'static str,
        json: &'static str,
    },
}

impl Source {
    pub fn remote_file(path: impl Into<String>) -> Self {
        Source::RemoteFile { path: path.into() }
    }

    pub fn local_file(path: impl Into<PathBuf>) -> Self {
        Source::LocalFile { path: path.into() }
    }

    /// Fetch a single JSON document. Directory sources have none.
    pub async fn fetch_document(&self, ctx: &SourceContext) -> Result<Value, FetchError> {
        match self {
            Source::RemoteFile { path } => ctx.repo.fetch_raw(path).await,
            Source::LocalFile { path } => read_local(&ctx.local_root.join(path)).await,
            Source::Embedded { label, json } => {
                serde_json::from_str(json).map_err(|e| FetchError::malformed(label, e))
            }
            Source::RemoteDirectory { path, .. } => Err(FetchError::malformed(
                path,
                "a directory is not a single document",
            )),
        }
    }

    async fn fetch_directory(
        &self,
        ctx: &SourceContext,
        query: DirectoryQuery,
        collection: &str,
    ) -> Result<Vec<Record>, FetchError> {
        let paginator = ctx.paginator();
        let listing_key = query.path.clone();

        let stored = ctx.listings.as_ref().and_then(|s| s.load_fresh(&listing_key));
        let items = match stored {
            Some(items) => items,
            None => {
                let items = paginator.list_directory(query).await?;
                if let Some(store) = &ctx.listings {
                    if let Err(e) = store.save(&listing_key, &items) {
                        debug!(listing = %listing_key, error = %e, "Failed to store listing");
                    }
                }
                items
            }
        };

        let outcome = paginator.download_in_batches(items).await;
        if outcome.records.is_empty() {
            if let Some(failure) = outcome.failures.into_iter().last() {
                return Err(failure.error);
            }
        }

        Ok(outcome
            .records
            .iter()
            .filter_map(|document| normalize_collection_for(document, collection))
            .flatten()
            .collect())
    }
}

#[async_trait]
impl CollectionSource for Source {
    fn label(&self) -> String {
        match self {
            Source::RemoteFile { path } => format!("remote:{}", path),
            Source::RemoteDirectory { path, .. } => format!("remote-dir:{}", path),
            Source::LocalFile { path } => format!("local:{}", path.display()),
            Source::Embedded { label, .. } => format!("embedded:{}", label),
        }
    }

    fn is_fallback(&self) -> bool {
        matches!(self, Source::Embedded { .. })
    }

    async fn fetch(
        &self,
        ctx: &SourceContext,
        collection: &str,
    ) -> Result<Vec<Record>, FetchError> {
        if let Source::RemoteDirectory {
            path,
            file_prefix,
            recursive,
        } = self
        {
            let query = DirectoryQuery {
                path: path.clone(),
                file_prefix: file_prefix.clone(),
                recursive: *recursive,
            };
            return self.fetch_directory(ctx, query, collection).await;
        }

        let document = self.fetch_document(ctx).await?;
        normalize_collection_for(&document, collection).ok_or_else(|| {
            warn!(source = %self.label(), "Unrecognized collection shape");
            FetchError::malformed(&self.label(), "no recognizable collection shape")
        })
    }
}

async fn read_local(path: &std::path::Path) -> Result<Value, FetchError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(path.display().to_string())
        } else {
            FetchError::Io(format!("{}: {}", path.display(), e))
        }
    })?;
    serde_json::from_str(&contents).map_err(|e| FetchError::malformed(&path.display().to_string(), e))
}
