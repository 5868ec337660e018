//! Paginated directory listing and paced batch downloads.
//!
//! Both run as lazy, finite streams of `BatchEvent`s: nothing is requested
//! until the stream is polled, and a caller that only wants the final result
//! can use `list_directory` / `download_in_batches`, which drain the stream.
//!
//! Pacing:
//! - listing pages are requested until one comes back short, with a
//!   cooldown every `listing_cooldown_every` pages
//! - downloads run `batch_size` items at a time, staggered by
//!   `item_stagger_ms`, with `batch_pause_ms` between batches
//! - a failed item is logged and recorded, never aborting the run

use std::collections::VecDeque;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{FetchError, GithubRepo, ListingItem};
use crate::config::BatchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Listing,
    Downloading,
}

/// Observational progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Progress {
    pub stage: Stage,
    /// Unknown while listing.
    pub total: Option<usize>,
    /// Files found so far (listing) or items processed so far (downloading).
    pub loaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub name: String,
    pub error: FetchError,
}

/// Result of a batched download.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Parsed documents, in item order, failures excluded.
    pub records: Vec<Value>,
    pub failures: Vec<ItemFailure>,
    pub batches: usize,
}

impl BatchOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Progress(Progress),
    /// Listing finished; carries the matching files.
    Listed(Vec<ListingItem>),
    /// Downloads finished.
    Downloaded(BatchOutcome),
    /// Listing failed; the stream ends.
    Failed(FetchError),
}

/// Which files of a remote directory to collect.
#[derive(Debug, Clone)]
pub struct DirectoryQuery {
    pub path: String,
    /// Only files whose name starts with this prefix (e.g. `case_`).
    pub file_prefix: Option<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl DirectoryQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_prefix: None,
            recursive: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    fn accepts(&self, item: &ListingItem) -> bool {
        item.is_file()
            && item.is_json()
            && self
                .file_prefix
                .as_deref()
                .map_or(true, |prefix| item.name.starts_with(prefix))
    }
}

#[derive(Clone)]
pub struct Paginator {
    repo: GithubRepo,
    config: BatchConfig,
}

impl Paginator {
    pub fn new(repo: GithubRepo, config: BatchConfig) -> Self {
        Self { repo, config }
    }

    /// Events for listing `query`, ending with `Listed` or `Failed`.
    pub fn list_stream(&self, query: DirectoryQuery) -> impl Stream<Item = BatchEvent> + Send {
        Walk::listing(self.clone(), query, false).into_stream()
    }

    /// Events for downloading `items`, ending with `Downloaded`.
    pub fn download_stream(&self, items: Vec<ListingItem>) -> impl Stream<Item = BatchEvent> + Send {
        Walk::downloading(self.clone(), items).into_stream()
    }

    /// Listing followed by download of every matching file.
    pub fn fetch_directory(&self, query: DirectoryQuery) -> impl Stream<Item = BatchEvent> + Send {
        Walk::listing(self.clone(), query, true).into_stream()
    }

    pub async fn list_directory(&self, query: DirectoryQuery) -> Result<Vec<ListingItem>, FetchError> {
        let events = self.list_stream(query);
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event {
                BatchEvent::Listed(items) => return Ok(items),
                BatchEvent::Failed(e) => return Err(e),
                _ => {}
            }
        }
        Ok(Vec::new())
    }

    pub async fn download_in_batches(&self, items: Vec<ListingItem>) -> BatchOutcome {
        let events = self.download_stream(items);
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            if let BatchEvent::Downloaded(outcome) = event {
                return outcome;
            }
        }
        BatchOutcome::default()
    }
}

enum Phase {
    Listing {
        directories: VecDeque<String>,
        page: usize,
        pages_fetched: usize,
        found: Vec<ListingItem>,
    },
    Downloading {
        batches: VecDeque<Vec<ListingItem>>,
        total: usize,
        processed: usize,
        outcome: BatchOutcome,
    },
    Done,
}

/// State machine behind the event streams. Each step performs one listing
/// page or one download batch.
struct Walk {
    paginator: Paginator,
    query: Option<DirectoryQuery>,
    download_after_listing: bool,
    phase: Phase,
    pending: VecDeque<BatchEvent>,
}

impl Walk {
    fn listing(paginator: Paginator, query: DirectoryQuery, download_after_listing: bool) -> Self {
        let mut directories = VecDeque::new();
        directories.push_back(query.path.trim_matches('/').to_string());
        Self {
            paginator,
            query: Some(query),
            download_after_listing,
            phase: Phase::Listing {
                directories,
                page: 1,
                pages_fetched: 0,
                found: Vec::new(),
            },
            pending: VecDeque::new(),
        }
    }

    fn downloading(paginator: Paginator, items: Vec<ListingItem>) -> Self {
        let phase = Self::download_phase(&paginator.config, items);
        Self {
            paginator,
            query: None,
            download_after_listing: true,
            phase,
            pending: VecDeque::new(),
        }
    }

    fn download_phase(config: &BatchConfig, items: Vec<ListingItem>) -> Phase {
        let total = items.len();
        let batch_size = config.batch_size.max(1);
        let batches = items
            .chunks(batch_size)
            .map(<[ListingItem]>::to_vec)
            .collect();
        Phase::Downloading {
            batches,
            total,
            processed: 0,
            outcome: BatchOutcome::default(),
        }
    }

    fn into_stream(self) -> impl Stream<Item = BatchEvent> + Send {
        stream::unfold(self, |mut walk| async move {
            let event = walk.next_event().await?;
            Some((event, walk))
        })
    }

    async fn next_event(&mut self) -> Option<BatchEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.phase {
                Phase::Done => return None,
                Phase::Listing { .. } => self.list_step().await,
                Phase::Downloading { .. } => self.download_step().await,
            }
        }
    }

    async fn list_step(&mut self) {
        let config = self.paginator.config;
        let page_size = config.listing_page_size.max(1);

        let Phase::Listing {
            directories,
            page,
            pages_fetched,
            found,
        } = &mut self.phase
        else {
            return;
        };

        let Some(directory) = directories.front().cloned() else {
            self.finish_listing();
            return;
        };

        if *pages_fetched > 0
            && config.listing_cooldown_every > 0
            && *pages_fetched % config.listing_cooldown_every == 0
        {
            debug!(pages = *pages_fetched, "Listing cooldown");
            tokio::time::sleep(Duration::from_millis(config.listing_cooldown_ms)).await;
        }

        let items = match self.paginator.repo.list_page(&directory, *page, page_size).await {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %directory, page = *page, error = %e, "Directory listing failed");
                self.pending.push_back(BatchEvent::Failed(e));
                self.phase = Phase::Done;
                return;
            }
        };
        *pages_fetched += 1;

        let recursive = self.query.as_ref().is_some_and(|q| q.recursive);
        let short_page = items.len() < page_size;
        for item in items {
            if item.is_dir() {
                if recursive {
                    let sub = item
                        .path
                        .clone()
                        .unwrap_or_else(|| format!("{}/{}", directory, item.name));
                    directories.push_back(sub);
                }
            } else if self.query.as_ref().is_some_and(|q| q.accepts(&item)) {
                found.push(item);
            }
        }

        if short_page {
            directories.pop_front();
            *page = 1;
        } else {
            *page += 1;
        }

        self.pending.push_back(BatchEvent::Progress(Progress {
            stage: Stage::Listing,
            total: None,
            loaded: found.len(),
            failed: 0,
        }));

        if directories.is_empty() {
            self.finish_listing();
        }
    }

    fn finish_listing(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        let Phase::Listing { found, .. } = phase else {
            return;
        };
        info!(files = found.len(), "Directory listing complete");

        self.pending.push_back(BatchEvent::Listed(found.clone()));
        if self.download_after_listing {
            self.phase = Self::download_phase(&self.paginator.config, found);
        }
    }

    async fn download_step(&mut self) {
        let config = self.paginator.config;
        let Phase::Downloading {
            batches,
            total,
            processed,
            outcome,
        } = &mut self.phase
        else {
            return;
        };

        let Some(batch) = batches.pop_front() else {
            info!(
                records = outcome.records.len(),
                failures = outcome.failures.len(),
                batches = outcome.batches,
                "Batch download complete"
            );
            let outcome = std::mem::take(outcome);
            self.pending.push_back(BatchEvent::Downloaded(outcome));
            self.phase = Phase::Done;
            return;
        };

        if outcome.batches > 0 {
            tokio::time::sleep(Duration::from_millis(config.batch_pause_ms)).await;
        }

        let requests = batch.iter().enumerate().map(|(index, item)| {
            let repo = self.paginator.repo.clone();
            let stagger = Duration::from_millis(config.item_stagger_ms * index as u64);
            async move {
                if !stagger.is_zero() {
                    tokio::time::sleep(stagger).await;
                }
                repo.fetch_item(item).await
            }
        });
        let results = join_all(requests).await;

        for (item, result) in batch.iter().zip(results) {
            match result {
                Ok(value) => outcome.records.push(value),
                Err(error) => {
                    warn!(file = %item.name, error = %error, "Skipping file that failed to download");
                    outcome.failures.push(ItemFailure {
                        name: item.name.clone(),
                        error,
                    });
                }
            }
        }
        outcome.batches += 1;
        *processed += batch.len();

        debug!(batch = outcome.batches, processed = *processed, total = *total, "Batch finished");
        self.pending.push_back(BatchEvent::Progress(Progress {
            stage: Stage::Downloading,
            total: Some(*total),
            loaded: *processed,
            failed: outcome.failures.len(),
        }));
    }
}
