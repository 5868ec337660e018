//! Embedded default collection, served when every live source fails.

use crate::models::Record;
use crate::source::normalize_collection_for;

/// The four sample cases, one per showcase category family.
pub const FALLBACK_CASES: &str = include_str!("../data/fallback_cases.json");

/// Parsed fallback cases.
pub fn fallback_cases() -> Vec<Record> {
    serde_json::from_str(FALLBACK_CASES)
        .ok()
        .and_then(|value| normalize_collection_for(&value, "cases"))
        .unwrap_or_default()
}
