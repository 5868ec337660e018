use thiserror::Error;

/// Failures surfaced by `DataService`.
///
/// Individual source failures never appear here; they are logged by the
/// resolver and the next source is tried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Every source for the named collection failed.
    #[error("No source could provide {0}")]
    Unavailable(String),
}
