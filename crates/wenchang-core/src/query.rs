use serde::{Deserialize, Serialize};

use crate::models::Record;

/// Caller-side filters and fetch flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default, rename_all = "camelCase")]
pub struct QueryOptions {
    pub category: Option<String>,
    #[serde(alias = "region")]
    pub province: Option<String>,
    pub level: Option<String>,
    /// First N records; `None` or 0 means unlimited.
    pub limit: Option<usize>,
    /// 1-based page, used together with `page_size`.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Skip the cache and re-resolve.
    pub force_refresh: bool,
    /// Allow the embedded sample data when every live source fails.
    pub use_fallback: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            category: None,
            province: None,
            level: None,
            limit: None,
            page: None,
            page_size: None,
            force_refresh: false,
            use_fallback: true,
        }
    }
}

impl QueryOptions {
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.use_fallback = false;
        self
    }

    /// Whether a record passes every filter that is set.
    pub fn matches(&self, record: &Record) -> bool {
        fn eq(filter: &Option<String>, value: Option<&str>) -> bool {
            filter.as_deref().map_or(true, |wanted| value == Some(wanted))
        }

        eq(&self.category, record.category.as_deref())
            && eq(&self.province, record.province())
            && eq(&self.level, record.level.as_deref())
    }
}

/// Filter, then window or truncate. Source order is kept.
pub fn project(records: &[Record], options: &QueryOptions) -> Vec<Record> {
    let filtered = records.iter().filter(|r| options.matches(r));

    match options.page_size {
        Some(size) if size > 0 => {
            let page = options.page.unwrap_or(1).max(1);
            filtered
                .skip((page - 1).saturating_mul(size))
                .take(size)
                .cloned()
                .collect()
        }
        _ => match options.limit {
            Some(limit) if limit > 0 => filtered.take(limit).cloned().collect(),
            _ => filtered.cloned().collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::fallback_cases;

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_category_filter() {
        let cases = fallback_cases();
        let options = QueryOptions::default().with_category("博物馆文创");
        assert_eq!(ids(&project(&cases, &options)), vec!["test_gugong_calendar"]);
    }

    #[test]
    fn test_limit_keeps_source_order() {
        let cases = fallback_cases();
        let options = QueryOptions::default().with_limit(2);
        assert_eq!(
            ids(&project(&cases, &options)),
            vec!["test_gugong_calendar", "test_lotus_buddha"]
        );

        let unlimited = QueryOptions::default().with_limit(0);
        assert_eq!(project(&cases, &unlimited).len(), 4);
    }

    #[test]
    fn test_category_with_limit_one() {
        let cases = fallback_cases();
        let options = QueryOptions::default().with_category("潮玩盲盒").with_limit(1);
        assert_eq!(ids(&project(&cases, &options)), vec!["test_popmart_star"]);
    }

    #[test]
    fn test_province_and_page_window() {
        let cases = fallback_cases();
        let beijing = QueryOptions::default().with_province("北京市");
        assert_eq!(project(&cases, &beijing).len(), 3);

        let second_page = beijing.clone().with_page(2, 2).with_limit(1);
        assert_eq!(ids(&project(&cases, &second_page)), vec!["test_popmart_star"]);

        let past_end = beijing.with_page(5, 2);
        assert!(project(&cases, &past_end).is_empty());

        let far_page = QueryOptions::default().with_page(usize::MAX, 2);
        assert!(project(&cases, &far_page).is_empty());
        let huge_window = QueryOptions::default().with_page(3, usize::MAX);
        assert!(project(&cases, &huge_window).is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        let cases = fallback_cases();
        let options = QueryOptions::default().with_category("不存在的分类");
        assert!(project(&cases, &options).is_empty());

        let options = QueryOptions::default().with_level("国家级");
        assert!(project(&cases, &options).is_empty());
    }

    #[test]
    fn test_region_alias_and_defaults() {
        let options: QueryOptions =
            serde_json::from_str(r#"{"region": "浙江省", "pageSize": 10}"#).unwrap();
        assert_eq!(options.province.as_deref(), Some("浙江省"));
        assert_eq!(options.page_size, Some(10));
        assert!(options.use_fallback);
        assert!(!options.force_refresh);
    }
}
