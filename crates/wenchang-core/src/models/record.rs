use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Field-mapping tables: every alias a dataset version has used for one
// canonical field, in lookup order.
const ID_KEYS: &[&str] = &["id", "case_id", "policy_id"];
const NAME_KEYS: &[&str] = &["name", "title"];
const CATEGORY_KEYS: &[&str] = &["category", "category_name"];
const SUBCATEGORY_KEYS: &[&str] = &["subcategory", "sub_category"];
const BRAND_KEYS: &[&str] = &["brand", "brand_name"];
const COMPANY_KEYS: &[&str] = &["company", "issuer", "organization"];
const LEVEL_KEYS: &[&str] = &["level", "policy_level"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "abstract"];
const HIGHLIGHT_KEYS: &[&str] = &["highlights", "tags", "keywords"];
const PROVINCE_KEYS: &[&str] = &["province", "region"];
const CITY_KEYS: &[&str] = &["city"];

/// Where a case or policy is based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Location {
    pub province: Option<String>,
    pub city: Option<String>,
}

impl Location {
    /// City if known, else province, else `未知`.
    pub fn display(&self) -> &str {
        self.city
            .as_deref()
            .or(self.province.as_deref())
            .unwrap_or("未知")
    }

    fn from_record(obj: &Map<String, Value>) -> Self {
        let mut location = match obj.get("location") {
            // Older files carry a flat string such as "北京市"
            Some(Value::String(s)) if !s.trim().is_empty() => Location {
                province: Some(s.trim().to_string()),
                city: None,
            },
            Some(Value::Object(nested)) => Location {
                province: lookup_string(nested, PROVINCE_KEYS),
                city: lookup_string(nested, CITY_KEYS),
            },
            _ => Location::default(),
        };

        if location.province.is_none() {
            location.province = lookup_string(obj, PROVINCE_KEYS);
        }
        if location.city.is_none() {
            location.city = lookup_string(obj, CITY_KEYS);
        }
        location
    }
}

/// Canonical case or policy record.
///
/// Produced once by `Record::from_value` and never mutated afterwards. The
/// original JSON object is kept in `fields` for renderers that need detail
/// sections (SWOT, channels, competitors, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Record {
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub company: Option<String>,
    pub level: Option<String>,
    pub description: Option<String>,
    pub location: Location,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

pub type Case = Record;
pub type Policy = Record;

impl Record {
    /// Map one raw JSON object onto the canonical shape.
    ///
    /// Returns `None` for non-objects and for objects without a usable id.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = lookup_id(obj)?;

        Some(Record {
            id,
            name: lookup_string(obj, NAME_KEYS),
            category: lookup_string(obj, CATEGORY_KEYS),
            subcategory: lookup_string(obj, SUBCATEGORY_KEYS),
            brand: lookup_brand(obj),
            company: lookup_string(obj, COMPANY_KEYS),
            level: lookup_string(obj, LEVEL_KEYS),
            description: lookup_string(obj, DESCRIPTION_KEYS),
            location: Location::from_record(obj),
            highlights: lookup_strings(obj, HIGHLIGHT_KEYS),
            fields: obj.clone(),
        })
    }

    /// Look up an original field by name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn province(&self) -> Option<&str> {
        self.location.province.as_deref()
    }
}

fn lookup_id(obj: &Map<String, Value>) -> Option<String> {
    ID_KEYS.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lookup_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lookup_strings(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `brand` is a plain name in summary files but a "brand gene" object in
/// the analyst template, where only its `name` identifies the brand.
fn lookup_brand(obj: &Map<String, Value>) -> Option<String> {
    BRAND_KEYS.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Object(nested)) => lookup_string(nested, NAME_KEYS),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_location_becomes_province() {
        let record = Record::from_value(&json!({
            "id": "test_gugong_calendar",
            "name": "故宫日历 2026 书画版",
            "category": "博物馆文创",
            "location": "北京市"
        }))
        .expect("record maps");
        assert_eq!(record.province(), Some("北京市"));
        assert_eq!(record.location.city, None);
        assert_eq!(record.location.display(), "北京市");
    }

    #[test]
    fn test_nested_location_and_aliases() {
        let record = Record::from_value(&json!({
            "id": 42,
            "title": "文化产业发展专项资金管理办法",
            "policy_level": "provincial",
            "summary": "支持文创企业",
            "location": {"province": "浙江省", "city": "杭州市"},
            "tags": ["资金", "补贴", 3]
        }))
        .expect("record maps");
        assert_eq!(record.id, "42");
        assert_eq!(record.name.as_deref(), Some("文化产业发展专项资金管理办法"));
        assert_eq!(record.level.as_deref(), Some("provincial"));
        assert_eq!(record.description.as_deref(), Some("支持文创企业"));
        assert_eq!(record.location.display(), "杭州市");
        assert_eq!(record.highlights, vec!["资金", "补贴"]);
    }

    #[test]
    fn test_top_level_region_fills_province() {
        let record = Record::from_value(&json!({"id": "p1", "region": "四川省"})).unwrap();
        assert_eq!(record.province(), Some("四川省"));
    }

    #[test]
    fn test_brand_object_uses_name_or_is_absent() {
        let with_name = Record::from_value(&json!({"id": "a", "brand": {"name": "故宫文创"}}))
            .unwrap();
        assert_eq!(with_name.brand.as_deref(), Some("故宫文创"));

        let gene_only = Record::from_value(&json!({
            "id": "b",
            "brand": {"slogan": "来自故宫的礼物"}
        }))
        .unwrap();
        assert_eq!(gene_only.brand, None);
        assert!(gene_only.field("brand").is_some());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(Record::from_value(&json!({"name": "no id"})).is_none());
        assert!(Record::from_value(&json!({"id": ""})).is_none());
        assert!(Record::from_value(&json!(["not", "an", "object"])).is_none());
    }
}
