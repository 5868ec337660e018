//! Shape normalization: every document layout the dataset has used is
//! turned into one ordered sequence of `Record`s.

use serde_json::Value;
use tracing::debug;

use crate::models::Record;

/// Wrapper fields that hold the actual sequence, in lookup order.
const SEQUENCE_KEYS: &[&str] = &["cases", "policies", "items", "records", "data", "list"];

/// Flatten `value` into raw record objects.
///
/// Returns `None` when the document has no recognizable collection shape.
pub fn flatten(value: &Value) -> Option<Vec<Value>> {
    flatten_preferring(value, None)
}

/// Like `flatten`, but a wrapper field named `preferred` is tried before
/// the generic sequence keys.
pub fn flatten_preferring(value: &Value, preferred: Option<&str>) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .flat_map(|item| expand_item(item, preferred))
                .collect(),
        ),
        Value::Object(obj) => {
            if obj.contains_key("id") {
                return Some(vec![value.clone()]);
            }
            if let Some(inner) = preferred
                .into_iter()
                .chain(SEQUENCE_KEYS.iter().copied())
                .filter_map(|key| obj.get(key))
                .find(|v| v.is_array() || v.is_object())
            {
                return flatten_preferring(inner, preferred);
            }
            // Grouped layout, e.g. {"national": [...], "provincial": {"浙江": [...]}}.
            // Scalar metadata next to the groups is ignored.
            let groups: Vec<Vec<Value>> = obj
                .values()
                .filter(|v| v.is_array() || v.is_object())
                .filter_map(|group| flatten_preferring(group, preferred))
                .collect();
            if groups.is_empty() {
                return None;
            }
            Some(groups.into_iter().flatten().collect())
        }
        _ => None,
    }
}

/// Array elements are records, but some files nest groups inside arrays.
fn expand_item(item: &Value, preferred: Option<&str>) -> Vec<Value> {
    match item {
        Value::Object(obj) if obj.contains_key("id") => vec![item.clone()],
        Value::Array(_) | Value::Object(_) => {
            flatten_preferring(item, preferred).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Normalize a document into canonical records, dropping entries without an id.
pub fn normalize_collection(value: &Value) -> Option<Vec<Record>> {
    to_records(flatten(value)?)
}

/// Normalize a document that belongs to `collection` (`cases`, `policies`).
/// A field named after the collection wins over other wrapper fields.
pub fn normalize_collection_for(value: &Value, collection: &str) -> Option<Vec<Record>> {
    to_records(flatten_preferring(value, Some(collection))?)
}

fn to_records(raw: Vec<Value>) -> Option<Vec<Record>> {
    let total = raw.len();
    let records: Vec<Record> = raw.iter().filter_map(Record::from_value).collect();
    if records.len() < total {
        debug!(dropped = total - records.len(), "Dropped entries without an id");
    }
    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(value: Value) -> Vec<String> {
        normalize_collection(&value)
            .expect("recognized shape")
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_plain_array() {
        assert_eq!(ids(json!([{"id": "a"}, {"id": "b"}])), vec!["a", "b"]);
    }

    #[test]
    fn test_named_sequence_field() {
        let doc = json!({"version": "2026.01", "cases": [{"id": "a"}], "total": 1});
        assert_eq!(ids(doc), vec!["a"]);
    }

    #[test]
    fn test_grouped_values_are_flattened_in_order() {
        let doc = json!({
            "national": [{"id": "n1"}],
            "provincial": {"浙江省": [{"id": "zj1"}, {"id": "zj2"}]},
        });
        assert_eq!(ids(doc), vec!["n1", "zj1", "zj2"]);
    }

    #[test]
    fn test_grouped_values_next_to_metadata() {
        let doc = json!({
            "updated": "2026-01",
            "count": 2,
            "national": [{"id": "n1"}],
            "provincial": {"浙江省": [{"id": "zj1"}]},
        });
        assert_eq!(ids(doc), vec!["n1", "zj1"]);
    }

    #[test]
    fn test_unrecognized_group_is_skipped() {
        let doc = json!({
            "meta": {"source": "manual"},
            "national": [{"id": "n1"}],
        });
        assert_eq!(ids(doc), vec!["n1"]);
    }

    #[test]
    fn test_own_collection_key_wins() {
        let doc = json!({
            "cases": [{"id": "case_1"}],
            "policies": [{"id": "policy_1"}],
        });
        let policies: Vec<String> = normalize_collection_for(&doc, "policies")
            .expect("recognized shape")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(policies, vec!["policy_1"]);
        assert_eq!(ids(doc), vec!["case_1"]);
    }

    #[test]
    fn test_single_record_document() {
        assert_eq!(ids(json!({"id": "case_001", "name": "x"})), vec!["case_001"]);
    }

    #[test]
    fn test_entries_without_id_are_dropped() {
        assert_eq!(ids(json!([{"id": "a"}, {"name": "orphan"}, 7])), vec!["a"]);
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(normalize_collection(&json!({"total_cases": 3, "data_version": "v1"})).is_none());
        assert!(normalize_collection(&json!("cases")).is_none());
        assert!(normalize_collection(&json!({})).is_none());
        assert!(normalize_collection(&json!({"total_cases": 3, "province_counts": {"北京市": 3}})).is_none());
    }

    #[test]
    fn test_empty_array_is_recognized_but_empty() {
        assert_eq!(normalize_collection(&json!([])).map(|r| r.len()), Some(0));
    }
}
