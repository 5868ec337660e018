//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{FetchClient, FetchError, GithubRepo, HttpResponse, HttpTransport};
use crate::config::{BatchConfig, RepoConfig, RetryPolicy};
use crate::source::SourceContext;

/// Fresh per-process scratch directory.
pub(crate) fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wenchang-{}-{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

/// Source context over a mock transport with default pacing.
pub(crate) fn source_context(mock: &Arc<MockTransport>, local_root: PathBuf) -> SourceContext {
    let fetch = FetchClient::new(mock.clone(), RetryPolicy::default());
    SourceContext::new(
        GithubRepo::new(fetch, RepoConfig::default()),
        local_root,
        BatchConfig::default(),
    )
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<Result<HttpResponse, FetchError>>>,
    sticky: HashMap<String, HttpResponse>,
    calls: HashMap<String, usize>,
}

/// Answers by URL: queued outcomes first, then a sticky response, then 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue one response per `(status, body)` pair.
    pub(crate) fn script(&self, url: &str, responses: Vec<(u16, &str)>) {
        let mut state = self.state.lock().expect("mock lock");
        let queue = state.queued.entry(url.to_string()).or_default();
        for (status, body) in responses {
            queue.push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
            }));
        }
    }

    /// Queue a transport-level failure.
    pub(crate) fn script_error(&self, url: &str, message: &str) {
        let mut state = self.state.lock().expect("mock lock");
        state
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(Err(FetchError::Network(message.to_string())));
    }

    /// Answer every unqueued request for `url` with this response.
    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        let mut state = self.state.lock().expect("mock lock");
        state.sticky.insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        let state = self.state.lock().expect("mock lock");
        state.calls.get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        let state = self.state.lock().expect("mock lock");
        state.calls.values().sum()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut state = self.state.lock().expect("mock lock");
        *state.calls.entry(url.to_string()).or_default() += 1;

        if let Some(next) = state.queued.get_mut(url).and_then(VecDeque::pop_front) {
            return next;
        }
        if let Some(response) = state.sticky.get(url) {
            return Ok(response.clone());
        }
        Ok(HttpResponse {
            status: 404,
            body: format!("unscripted url {}", url),
        })
    }
}
