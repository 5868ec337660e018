//! GitHub contents API and raw file endpoints for the dataset repository.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RepoConfig;

use super::{FetchClient, FetchError};

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One entry of a contents API directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ListingItem {
    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Dir
    }

    pub fn is_json(&self) -> bool {
        self.name.ends_with(".json")
    }
}

/// Client bound to one dataset repository.
#[derive(Clone)]
pub struct GithubRepo {
    fetch: FetchClient,
    repo: RepoConfig,
}

impl GithubRepo {
    pub fn new(fetch: FetchClient, repo: RepoConfig) -> Self {
        Self { fetch, repo }
    }

    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }

    pub fn config(&self) -> &RepoConfig {
        &self.repo
    }

    /// `{api_base}/contents/{path}?ref={branch}&per_page={n}&page={p}`
    pub fn listing_url(&self, path: &str, page: usize, per_page: usize) -> String {
        format!(
            "{}/contents/{}?ref={}&per_page={}&page={}",
            self.repo.api_base_url.trim_end_matches('/'),
            path.trim_matches('/'),
            self.repo.branch,
            per_page,
            page
        )
    }

    /// `{raw_base}/{path}`
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.repo.raw_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Fetch one page of a directory listing.
    pub async fn list_page(
        &self,
        path: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ListingItem>, FetchError> {
        let url = self.listing_url(path, page, per_page);
        self.fetch.fetch_typed(&url).await
    }

    /// Fetch a file through the raw endpoint.
    pub async fn fetch_raw(&self, path: &str) -> Result<Value, FetchError> {
        self.fetch.fetch_json(&self.raw_url(path)).await
    }

    /// Fetch a listed file, preferring its `download_url`.
    pub async fn fetch_item(&self, item: &ListingItem) -> Result<Value, FetchError> {
        match (&item.download_url, &item.path) {
            (Some(url), _) => self.fetch.fetch_json(url).await,
            (None, Some(path)) => self.fetch_raw(path).await,
            (None, None) => Err(FetchError::NotFound(format!(
                "listing item {} has no download reference",
                item.name
            ))),
        }
    }
}
