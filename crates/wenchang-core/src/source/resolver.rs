use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::Record;
use crate::query::QueryOptions;

use super::{CollectionSource, SourceContext};

/// A collection served by one source.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub records: Arc<Vec<Record>>,
    /// Label of the source that answered.
    pub source: String,
    /// True when the embedded fallback answered.
    pub fallback: bool,
}

/// Outcome of walking a source list.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Resolved),
    /// At least one source answered, but every answer was empty.
    EmptyButPresent,
    /// Every consulted source failed.
    Unavailable,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// Records of a found collection, empty otherwise.
    pub fn records(&self) -> &[Record] {
        match self {
            Resolution::Found(resolved) => resolved.records.as_slice(),
            _ => &[],
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Resolution::Found(resolved) => {
                Arc::try_unwrap(resolved.records).unwrap_or_else(|shared| (*shared).clone())
            }
            _ => Vec::new(),
        }
    }
}

/// Try `sources` in order and return the first non-empty collection.
///
/// Source failures are logged and turn into "try the next one"; they never
/// escape. Later sources are not consulted once one succeeds, and fallback
/// sources are skipped unless `options.use_fallback` is set.
pub async fn resolve_collection(
    name: &str,
    sources: &[Arc<dyn CollectionSource>],
    ctx: &SourceContext,
    options: &QueryOptions,
) -> Resolution {
    let mut answered = false;

    for source in sources {
        let label = source.label();
        if source.is_fallback() && !options.use_fallback {
            debug!(collection = name, source = %label, "Fallback disabled, skipping");
            continue;
        }

        match source.fetch(ctx, name).await {
            Ok(records) if !records.is_empty() => {
                info!(collection = name, source = %label, count = records.len(), "Collection resolved");
                return Resolution::Found(Resolved {
                    records: Arc::new(records),
                    source: label,
                    fallback: source.is_fallback(),
                });
            }
            Ok(_) => {
                debug!(collection = name, source = %label, "Source is empty, trying next");
                answered = true;
            }
            Err(e) => {
                warn!(collection = name, source = %label, error = %e, "Source failed, trying next");
            }
        }
    }

    if answered {
        Resolution::EmptyButPresent
    } else {
        warn!(collection = name, "No source could provide the collection");
        Resolution::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::api::FetchError;
    use crate::fallback::fallback_cases;
    use crate::testing::{source_context, MockTransport};

    /// Source with a fixed answer that counts how often it is consulted.
    struct FixedSource {
        label: &'static str,
        answer: Result<Vec<Record>, FetchError>,
        fallback: bool,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(label: &'static str, answer: Result<Vec<Record>, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                label,
                answer,
                fallback: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn fallback(records: Vec<Record>) -> Arc<Self> {
            Arc::new(Self {
                label: "fallback",
                answer: Ok(records),
                fallback: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CollectionSource for FixedSource {
        fn label(&self) -> String {
            self.label.to_string()
        }

        fn is_fallback(&self) -> bool {
            self.fallback
        }

        async fn fetch(
            &self,
            _ctx: &SourceContext,
            _collection: &str,
        ) -> Result<Vec<Record>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_value(&serde_json::json!({"id": format!("r{}", i)})).unwrap())
            .collect()
    }

    fn ctx() -> SourceContext {
        source_context(&Arc::new(MockTransport::new()), PathBuf::from("unused"))
    }

    #[tokio::test]
    async fn test_first_usable_source_wins() {
        let a = FixedSource::new("a", Err(FetchError::ServerError("down".into())));
        let b = FixedSource::new("b", Ok(records(5)));
        let c = FixedSource::fallback(fallback_cases());
        let sources: Vec<Arc<dyn CollectionSource>> = vec![a.clone(), b.clone(), c.clone()];

        let resolution = resolve_collection("cases", &sources, &ctx(), &QueryOptions::default()).await;

        let Resolution::Found(resolved) = resolution else {
            panic!("expected a found collection");
        };
        assert_eq!(resolved.records.len(), 5);
        assert_eq!(resolved.source, "b");
        assert!(!resolved.fallback);
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_all_failing_uses_fallback_when_permitted() {
        let a = FixedSource::new("a", Err(FetchError::RateLimited));
        let b = FixedSource::new("b", Err(FetchError::malformed("b", "eof")));
        let c = FixedSource::fallback(fallback_cases());
        let sources: Vec<Arc<dyn CollectionSource>> = vec![a, b, c];

        let resolution = resolve_collection("cases", &sources, &ctx(), &QueryOptions::default()).await;
        let ids: Vec<&str> = resolution.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["test_gugong_calendar", "test_lotus_buddha", "test_gugong_lipstick", "test_popmart_star"]
        );
        assert!(matches!(resolution, Resolution::Found(ref r) if r.fallback));
    }

    #[tokio::test]
    async fn test_all_failing_without_fallback_is_unavailable_and_empty() {
        let a = FixedSource::new("a", Err(FetchError::Network("reset".into())));
        let c = FixedSource::fallback(fallback_cases());
        let sources: Vec<Arc<dyn CollectionSource>> = vec![a, c.clone()];

        let options = QueryOptions::default().without_fallback();
        let resolution = resolve_collection("cases", &sources, &ctx(), &options).await;

        assert!(matches!(resolution, Resolution::Unavailable));
        assert!(resolution.into_records().is_empty());
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_answers_are_distinguished_from_failures() {
        let a = FixedSource::new("a", Ok(Vec::new()));
        let b = FixedSource::new("b", Err(FetchError::NotFound("b".into())));
        let sources: Vec<Arc<dyn CollectionSource>> = vec![a, b];

        let options = QueryOptions::default().without_fallback();
        let resolution = resolve_collection("policies", &sources, &ctx(), &options).await;
        assert!(matches!(resolution, Resolution::EmptyButPresent));
        assert!(resolution.records().is_empty());
    }
}
