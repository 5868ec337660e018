use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::Record;

/// Province bucket for records without a location.
const UNKNOWN_PROVINCE: &str = "未知";

/// Category bucket for records without a category.
const OTHER_CATEGORY: &str = "其他";

/// Dataset summary shown on the landing page.
///
/// Published as `stats.json` next to the collections; when that file is not
/// reachable it is derived from the resolved collections instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct StatsRecord {
    pub total_cases: u64,
    pub total_policies: u64,
    pub total_brands: u64,
    pub data_version: Option<String>,
    pub progress_percent: Option<f64>,
    pub province_counts: BTreeMap<String, u64>,
    pub category_counts: BTreeMap<String, u64>,
}

impl StatsRecord {
    /// Compute the summary from resolved collections.
    pub fn derive(cases: &[Record], policies: &[Record]) -> Self {
        let mut province_counts = BTreeMap::new();
        let mut category_counts = BTreeMap::new();
        let mut brands = BTreeSet::new();

        for case in cases {
            let province = case.province().unwrap_or(UNKNOWN_PROVINCE);
            *province_counts.entry(province.to_string()).or_insert(0) += 1;

            let category = case.category.as_deref().unwrap_or(OTHER_CATEGORY);
            *category_counts.entry(category.to_string()).or_insert(0) += 1;

            if let Some(brand) = case.brand.as_deref() {
                brands.insert(brand);
            }
        }

        StatsRecord {
            total_cases: cases.len() as u64,
            total_policies: policies.len() as u64,
            total_brands: brands.len() as u64,
            data_version: None,
            progress_percent: None,
            province_counts,
            category_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(&value).expect("fixture record")
    }

    #[test]
    fn test_parse_published_stats_file() {
        let stats: StatsRecord = serde_json::from_str(
            r#"{"total_cases": 128, "total_policies": 56, "total_brands": 40,
                "data_version": "2026.03", "progress_percent": 64.5}"#,
        )
        .expect("stats parse");
        assert_eq!(stats.total_cases, 128);
        assert_eq!(stats.data_version.as_deref(), Some("2026.03"));
        assert!(stats.province_counts.is_empty());
    }

    #[test]
    fn test_derive_counts_buckets() {
        let cases = vec![
            record(json!({"id": "a", "category": "博物馆文创", "brand": "故宫文创", "location": "北京市"})),
            record(json!({"id": "b", "category": "博物馆文创", "brand": "故宫文创", "location": "北京市"})),
            record(json!({"id": "c", "brand": "泡泡玛特"})),
        ];
        let policies = vec![record(json!({"id": "p1"}))];

        let stats = StatsRecord::derive(&cases, &policies);
        assert_eq!(stats.total_cases, 3);
        assert_eq!(stats.total_policies, 1);
        assert_eq!(stats.total_brands, 2);
        assert_eq!(stats.province_counts.get("北京市"), Some(&2));
        assert_eq!(stats.province_counts.get("未知"), Some(&1));
        assert_eq!(stats.category_counts.get("其他"), Some(&1));
    }
}
