//! Wenchang data layer.
//!
//! Fetches the cultural-creative case and policy collections from a
//! GitHub-hosted dataset, falling back through aggregate files, the
//! per-record directory, local static files and embedded sample data.
//! Results are cached per collection with a TTL and concurrent requests
//! for the same collection share one resolution.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod models;
pub mod query;
pub mod service;
pub mod source;

#[cfg(test)]
mod testing;

pub use api::{FetchClient, FetchError, HttpTransport};
pub use batch::{BatchEvent, BatchOutcome, DirectoryQuery, Paginator, Progress, Stage};
pub use config::Config;
pub use error::DataError;
pub use models::{Case, Location, Policy, Record, StatsRecord};
pub use query::{project, QueryOptions};
pub use service::{DataService, Dataset};
pub use source::{Collection, Resolution, Resolved};
