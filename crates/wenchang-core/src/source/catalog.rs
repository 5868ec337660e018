use std::fmt;
use std::sync::Arc;

use crate::config::RepoConfig;
use crate::fallback::FALLBACK_CASES;

use super::{CollectionSource, Source};

/// Logical collections served by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Cases,
    Policies,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Cases => "cases",
            Collection::Policies => "policies",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of the stats entry in caches and logs.
pub const STATS: &str = "stats";

/// Ordered source lists for every collection plus the stats file.
#[derive(Clone)]
pub struct Catalog {
    pub cases: Vec<Arc<dyn CollectionSource>>,
    pub policies: Vec<Arc<dyn CollectionSource>>,
    pub stats: Vec<Source>,
}

impl Catalog {
    /// Summary file, full file, paginated directory, local static files,
    /// then embedded data where there is any.
    pub fn standard(repo: &RepoConfig) -> Self {
        let mut cases = Self::file_sources(repo, Collection::Cases);
        cases.insert(
            2,
            Arc::new(Source::RemoteDirectory {
                path: repo.cases_path.clone(),
                // brand_*.json files in the same directory are brand lists
                file_prefix: Some("case_".to_string()),
                recursive: false,
            }),
        );
        cases.push(Arc::new(Source::Embedded {
            label: "sample cases",
            json: FALLBACK_CASES,
        }));

        let mut policies = Self::file_sources(repo, Collection::Policies);
        policies.insert(
            2,
            Arc::new(Source::RemoteDirectory {
                path: repo.policies_path.clone(),
                file_prefix: None,
                recursive: true,
            }),
        );

        Self {
            cases,
            policies,
            stats: vec![
                Source::remote_file(repo.data_file_path("stats.json")),
                Source::local_file("stats.json"),
            ],
        }
    }

    fn file_sources(repo: &RepoConfig, collection: Collection) -> Vec<Arc<dyn CollectionSource>> {
        let summary = format!("{}_summary.json", collection.name());
        let full = format!("{}_full.json", collection.name());
        vec![
            Arc::new(Source::remote_file(repo.data_file_path(&summary))),
            Arc::new(Source::remote_file(repo.data_file_path(&full))),
            Arc::new(Source::local_file(summary)),
            Arc::new(Source::local_file(full)),
        ]
    }

    pub fn sources(&self, collection: Collection) -> &[Arc<dyn CollectionSource>] {
        match collection {
            Collection::Cases => &self.cases,
            Collection::Policies => &self.policies,
        }
    }

    /// Replace the source list of one collection.
    pub fn with_sources(
        mut self,
        collection: Collection,
        sources: Vec<Arc<dyn CollectionSource>>,
    ) -> Self {
        match collection {
            Collection::Cases => self.cases = sources,
            Collection::Policies => self.policies = sources,
        }
        self
    }
}
