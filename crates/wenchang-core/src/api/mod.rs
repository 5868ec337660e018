//! Remote access module for the GitHub-hosted dataset.
//!
//! `FetchClient` wraps an `HttpTransport` with retry and backoff;
//! `GithubRepo` builds contents-API and raw-file URLs on top of it.

pub mod client;
pub mod error;
pub mod github;

pub use client::{FetchClient, HttpResponse, HttpTransport, ReqwestTransport};
pub use error::FetchError;
pub use github::{GithubRepo, ItemKind, ListingItem};
